//! crates/forum_answers_core/src/validation.rs
//!
//! Input checks applied before any network call is made.

use crate::ports::{PortError, PortResult};

pub const MAX_FORUM_NAME_CHARS: usize = 50;
pub const MIN_QUESTION_CHARS: usize = 5;
pub const MAX_QUESTION_CHARS: usize = 500;

/// Accepts names matching `^[A-Za-z0-9_]{1,50}$`.
pub fn validate_forum_name(forum: &str) -> PortResult<()> {
    if forum.is_empty() {
        return Err(PortError::Validation("Forum name is required".to_string()));
    }
    if forum.chars().count() > MAX_FORUM_NAME_CHARS {
        return Err(PortError::Validation(format!(
            "Forum name must be at most {MAX_FORUM_NAME_CHARS} characters"
        )));
    }
    if !forum.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PortError::Validation(
            "Forum name may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

/// Returns the trimmed question when its length is within bounds.
pub fn validate_question(question: &str) -> PortResult<&str> {
    let trimmed = question.trim();
    let len = trimmed.chars().count();
    if len < MIN_QUESTION_CHARS {
        return Err(PortError::Validation(format!(
            "Question must be at least {MIN_QUESTION_CHARS} characters"
        )));
    }
    if len > MAX_QUESTION_CHARS {
        return Err(PortError::Validation(format!(
            "Question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// Checks `model` against the configured allow-list.
pub fn validate_model<'a>(model: &str, allowed: &'a [String]) -> PortResult<&'a str> {
    allowed
        .iter()
        .find(|candidate| candidate.as_str() == model)
        .map(String::as_str)
        .ok_or_else(|| {
            PortError::Validation(format!(
                "Model '{model}' is not supported; choose one of: {}",
                allowed.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_forum_names() {
        for name in ["technology", "AskReddit", "rust_gamedev", "a", &"x".repeat(50)] {
            assert!(validate_forum_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_forum_names() {
        for name in ["", "r/rust", "two words", "dash-ed", "ünïcode", "../etc", &"x".repeat(51)] {
            assert!(
                matches!(validate_forum_name(name), Err(PortError::Validation(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn question_length_is_measured_after_trimming() {
        assert!(validate_question("   abcd   ").is_err());
        assert_eq!(validate_question("  abcde  ").unwrap(), "abcde");
        assert!(validate_question(&"q".repeat(500)).is_ok());
        assert!(validate_question(&"q".repeat(501)).is_err());
    }

    #[test]
    fn model_must_be_allow_listed() {
        let allowed = vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()];
        assert_eq!(validate_model("gpt-4o", &allowed).unwrap(), "gpt-4o");
        assert!(matches!(
            validate_model("gpt-2", &allowed),
            Err(PortError::Validation(_))
        ));
    }
}
