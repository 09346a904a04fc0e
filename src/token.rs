//! Token counting utilities
//!
//! Client-side token estimation using tiktoken's cl100k_base encoding,
//! which is a close approximation for most modern LLMs.

use crate::message::Message;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    cl100k_base().expect("cl100k_base tokenizer is a compile-time constant and should never fail")
});

/// Per-message structure overhead (role marker + separators)
const MESSAGE_OVERHEAD: usize = 6;

/// Count tokens in a string
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}

/// Count tokens across a conversation, including per-message overhead
#[must_use]
pub fn count_message_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| count_tokens(&m.content) + MESSAGE_OVERHEAD)
        .sum()
}
