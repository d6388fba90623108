pub mod classify;
pub mod models;
pub mod summarize;

pub use classify::{classify_content, CLASSIFY_SNIPPET_CHARS};
pub use models::create_model;
pub use summarize::{parse_summary, summarize_entry, SummaryError, SUMMARY_CONTENT_CHARS};

/// First `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub mod prelude {
    pub use super::models::create_model;
    pub use super::{classify_content, summarize_entry, SummaryError};
    pub use rl_core::{ArticleDraft, Error, InferenceModel, Result};
}
