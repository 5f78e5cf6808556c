pub mod identity;
pub mod moderation;
pub mod mosques;
pub mod posts;
pub mod prayer_times;

#[cfg(test)]
pub mod testing;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Regex, RegexBuilder};

use crate::error::ServiceError;

/// Upper bound on any list read from the store.
pub const LIST_LIMIT: i64 = 1000;

/// Validates an uploaded blob and returns its canonical base64 text.
pub(crate) fn normalize_base64(field: &'static str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::MissingField(field));
    }
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|_| ServiceError::InvalidAttachment(field))?;
    Ok(STANDARD.encode(bytes))
}

/// Case-insensitive substring matcher for user-supplied search text.
pub(crate) fn search_pattern(needle: &str) -> Result<Regex, ServiceError> {
    RegexBuilder::new(&regex::escape(needle.trim()))
        .case_insensitive(true)
        .build()
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        Err(ServiceError::MissingField(field))
    } else {
        Ok(())
    }
}
