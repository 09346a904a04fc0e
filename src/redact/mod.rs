//! PII redaction
//!
//! Scans free-form text for sensitive patterns and replaces every match
//! with a fixed placeholder before the text leaves the process. Placeholder
//! strings are stable; downstream consumers may match on them.

use crate::config::RedactionSettings;
use crate::error::{Error, Result};
use regex::{NoExpand, Regex};
use std::sync::LazyLock;
use tracing::warn;


/// A built-in redaction pattern
struct BuiltinPattern {
    name: &'static str,
    regex: Regex,
    placeholder: &'static str,
}

/// Built-in patterns, in application order.
///
/// Longer digit runs (credit cards) are consumed before shorter ones (SSN,
/// phone) so overlapping matches resolve deterministically.
static BUILTINS: LazyLock<Vec<BuiltinPattern>> = LazyLock::new(|| {
    let compile = |name, pattern, placeholder| BuiltinPattern {
        name,
        regex: Regex::new(pattern).expect("built-in redaction pattern is valid"),
        placeholder,
    };
    vec![
        compile(
            "email",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            "[EMAIL-REDACTED]",
        ),
        compile(
            "credit_card",
            r"\b(?:4\d{3}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}|5[1-5]\d{2}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}|3[47]\d{2}[ -]?\d{6}[ -]?\d{5}|6(?:011|5\d{2})[ -]?\d{4}[ -]?\d{4}[ -]?\d{4})\b",
            "[CREDIT-CARD-REDACTED]",
        ),
        compile("ein", r"\b\d{2}-\d{7}\b", "[EIN-REDACTED]"),
        compile(
            "ssn",
            r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b",
            "[SSN-REDACTED]",
        ),
        compile(
            "phone",
            r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            "[PHONE-REDACTED]",
        ),
        compile(
            "ip_address",
            r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
            "[IP-REDACTED]",
        ),
        compile(
            "street_address",
            r"(?i)\b\d+\s+(?:[a-z]+\s+){1,4}(?:street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln|court|ct|place|pl|way)\b",
            "[ADDRESS-REDACTED]",
        ),
    ]
});

/// A compiled redaction rule (built-in or custom)
#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    replacement: String,
}

/// Pattern-based PII scrubber
///
/// Pure function of (text, rule set): deterministic, never fails, and
/// identity on text containing no matches. When constructed from disabled
/// settings, `redact` is the identity function.
#[derive(Debug)]
pub struct PiiRedactor {
    enabled: bool,
    rules: Vec<CompiledRule>,
}

impl PiiRedactor {
    /// Compile a redactor from configuration.
    ///
    /// A malformed custom pattern is a configuration error and fails
    /// construction; built-in patterns cannot fail. Unknown built-in
    /// pattern names are skipped with a warning.
    pub fn new(settings: &RedactionSettings) -> Result<Self> {
        let mut rules = Vec::new();

        for builtin in BUILTINS.iter() {
            let selected =
                settings.patterns.is_empty() || settings.patterns.iter().any(|p| p == builtin.name);
            if selected {
                rules.push(CompiledRule {
                    regex: builtin.regex.clone(),
                    replacement: builtin.placeholder.to_string(),
                });
            }
        }

        for name in &settings.patterns {
            if !BUILTINS.iter().any(|b| b.name == name) {
                warn!(pattern = %name, "Unknown built-in redaction pattern, skipping");
            }
        }

        for rule in &settings.custom_rules {
            let regex = Regex::new(&rule.pattern).map_err(|e| {
                Error::Config(format!("invalid custom redaction pattern '{}': {e}", rule.name))
            })?;
            rules.push(CompiledRule {
                regex,
                replacement: rule.replacement.clone(),
            });
        }

        Ok(Self {
            enabled: settings.enabled,
            rules,
        })
    }

    /// Redactor that applies every built-in pattern.
    #[must_use]
    pub fn with_defaults() -> Self {
        // Default settings have no custom rules, so compilation cannot fail.
        Self::new(&RedactionSettings::default()).expect("default redaction settings are valid")
    }

    /// Whether redaction is enabled at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace every sensitive match in `text` with its placeholder.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let mut output = text.to_string();
        for rule in &self.rules {
            // Replacements are fixed text; `$` in a custom replacement must
            // never expand as a capture reference.
            output = rule
                .regex
                .replace_all(&output, NoExpand(rule.replacement.as_str()))
                .into_owned();
        }
        output
    }
}
