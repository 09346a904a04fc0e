//! Pre-built schema shapes
//!
//! These three shapes recur across call sites, so they ship as named
//! factories instead of being rebuilt inline everywhere.

use serde_json::{json, Value};

/// Narrative shape: summary, key points, confidence in [0, 1], optional
/// metadata with an enumerated valuation approach.
#[must_use]
pub fn narrative_schema() -> Value {
    json!({
        "type": "object",
        "required": ["summary", "key_points", "confidence"],
        "properties": {
            "summary": { "type": "string", "minLength": 1 },
            "key_points": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string" }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "metadata": {
                "type": "object",
                "properties": {
                    "approach": {
                        "type": "string",
                        "enum": ["sales", "income", "cost"]
                    }
                }
            }
        }
    })
}

/// Packet shape: a cover letter with a minimum length, a non-empty list of
/// argument objects each requiring a point and supporting evidence, and a
/// conclusion with a minimum length.
#[must_use]
pub fn packet_schema() -> Value {
    json!({
        "type": "object",
        "required": ["cover_letter", "arguments", "conclusion"],
        "properties": {
            "cover_letter": { "type": "string", "minLength": 100 },
            "arguments": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["point", "evidence"],
                    "properties": {
                        "point": { "type": "string" },
                        "evidence": { "type": "string" }
                    }
                }
            },
            "conclusion": { "type": "string", "minLength": 50 }
        }
    })
}

/// Structured-extraction shape: nested property/financials objects, overall
/// confidence, optional warnings.
#[must_use]
pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "required": ["property", "financials", "confidence"],
        "properties": {
            "property": {
                "type": "object",
                "required": ["address"],
                "properties": {
                    "address": { "type": "string" },
                    "parcel_id": { "type": "string" }
                }
            },
            "financials": {
                "type": "object",
                "properties": {
                    "assessed_value": { "type": "number" },
                    "market_value": { "type": "number" },
                    "annual_tax": { "type": "number" }
                }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "warnings": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}
