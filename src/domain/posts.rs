//! Post and comment invariants shared by authoring flows.

use crate::domain::error::DomainError;

/// Number of characters shown when a post is referenced by label.
pub const POST_LABEL_CHARS: usize = 15;

/// Short label for a post: the first characters of its text.
pub fn post_label(text: &str) -> &str {
    match text.char_indices().nth(POST_LABEL_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Validate post or comment body text, returning it unchanged when acceptable.
pub fn validate_text(field: &'static str, text: &str) -> Result<String, DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(text.to_string())
}

/// Normalise an optional image reference; blank values mean "no image".
pub fn normalize_image(image: Option<&str>) -> Option<String> {
    image
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
