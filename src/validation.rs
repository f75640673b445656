use crate::models::{EditDraft, FieldErrors};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// Permissive address-shape check: local part, '@', a first label, then one or
// more dot-separated labels. Not RFC 5322.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9+._%\-]{1,256}@[A-Za-z0-9][A-Za-z0-9\-]{0,64}(\.[A-Za-z0-9][A-Za-z0-9\-]{0,25})+$",
    )
    .expect("valid email regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Phone number cannot be empty")]
    EmptyPhone,
    #[error("Invalid email format")]
    InvalidEmailFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftValidation {
    pub errors: FieldErrors,
    pub accepted: bool,
}

pub fn validate_name(text: &str) -> Result<(), FieldError> {
    if text.trim().is_empty() {
        return Err(FieldError::EmptyName);
    }
    Ok(())
}

pub fn validate_phone(text: &str) -> Result<(), FieldError> {
    if text.trim().is_empty() {
        return Err(FieldError::EmptyPhone);
    }
    Ok(())
}

/// Blank input is accepted: email is optional.
pub fn validate_email(text: &str) -> Result<(), FieldError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || EMAIL_PATTERN.is_match(trimmed) {
        return Ok(());
    }
    Err(FieldError::InvalidEmailFormat)
}

pub fn validate_all(draft: &EditDraft) -> DraftValidation {
    let name = validate_name(&draft.name);
    let phone = validate_phone(&draft.phone_number);
    let email = validate_email(&draft.email);

    DraftValidation {
        accepted: name.is_ok() && phone.is_ok() && email.is_ok(),
        errors: FieldErrors {
            name_error: error_message(name),
            phone_error: error_message(phone),
            email_error: error_message(email),
        },
    }
}

pub fn error_message(result: Result<(), FieldError>) -> String {
    result.err().map(|error| error.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{validate_all, validate_email, validate_name, validate_phone, FieldError};
    use crate::models::EditDraft;

    fn draft(name: &str, phone: &str, email: &str) -> EditDraft {
        EditDraft {
            name: name.to_string(),
            phone_number: phone.to_string(),
            email: email.to_string(),
            edit_target: None,
        }
    }

    #[test]
    fn email_shapes_match_expected_grammar() {
        assert_eq!(validate_email(""), Ok(()));
        assert_eq!(validate_email("   "), Ok(()));
        assert_eq!(validate_email("a@b.c"), Ok(()));
        assert_eq!(validate_email(" ann.lee+work@mail.example-host.org "), Ok(()));
        assert_eq!(validate_email("not-an-email"), Err(FieldError::InvalidEmailFormat));
        assert_eq!(validate_email("a@@b.com"), Err(FieldError::InvalidEmailFormat));
        assert_eq!(validate_email("a@b"), Err(FieldError::InvalidEmailFormat));
        assert_eq!(validate_email("a@b..com"), Err(FieldError::InvalidEmailFormat));
        assert_eq!(validate_email("a b@c.com"), Err(FieldError::InvalidEmailFormat));
    }

    #[test]
    fn email_label_lengths_are_bounded() {
        let first_label_ok = format!("a@{}.com", "x".repeat(65));
        let first_label_too_long = format!("a@{}.com", "x".repeat(66));
        let tail_label_ok = format!("a@b.{}", "y".repeat(26));
        let tail_label_too_long = format!("a@b.{}", "y".repeat(27));
        assert!(validate_email(&first_label_ok).is_ok());
        assert!(validate_email(&first_label_too_long).is_err());
        assert!(validate_email(&tail_label_ok).is_ok());
        assert!(validate_email(&tail_label_too_long).is_err());
    }

    #[test]
    fn name_and_phone_require_non_blank_text() {
        assert_eq!(validate_name(" "), Err(FieldError::EmptyName));
        assert_eq!(validate_name(" Ann "), Ok(()));
        assert_eq!(validate_phone("\t"), Err(FieldError::EmptyPhone));
        assert_eq!(validate_phone("555"), Ok(()));
    }

    #[test]
    fn blank_name_rejects_the_draft() {
        let result = validate_all(&draft(" ", "555", ""));
        assert!(!result.accepted);
        assert_eq!(result.errors.name_error, "Name cannot be empty");
        assert!(result.errors.phone_error.is_empty());
        assert!(result.errors.email_error.is_empty());
    }

    #[test]
    fn bad_email_rejects_an_otherwise_valid_draft() {
        let result = validate_all(&draft("Ann", "555", "ann@"));
        assert!(!result.accepted);
        assert_eq!(result.errors.email_error, "Invalid email format");
    }

    #[test]
    fn complete_draft_is_accepted() {
        let result = validate_all(&draft("Ann", "12345", "ann@example.com"));
        assert!(result.accepted);
        assert!(result.errors.is_clear());
    }
}
