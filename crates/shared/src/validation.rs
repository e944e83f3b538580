//! Common validation and normalisation helpers.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// Handles are 3-30 chars of lowercase letters, digits, dot or underscore.
    static ref HANDLE_REGEX: Regex = Regex::new(r"^[a-z0-9_.]{3,30}$").unwrap();

    /// Invite codes use the XXX-XXX-XXX shape.
    static ref INVITE_CODE_REGEX: Regex =
        Regex::new(r"^[A-Z0-9]{3}-[A-Z0-9]{3}-[A-Z0-9]{3}$").unwrap();
}

/// Normalises a user handle: trims whitespace, strips a leading `@`, lowercases.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// Validates a handle (accepts `@` prefixed input).
pub fn validate_handle(raw: &str) -> Result<(), ValidationError> {
    if HANDLE_REGEX.is_match(&normalize_handle(raw)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("handle_format");
        err.message = Some("Handle must be 3-30 letters, digits, '.' or '_'".into());
        Err(err)
    }
}

/// Normalises an invite code as typed by a person: trims and uppercases.
pub fn normalize_invite_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Returns true when the code has the expected invite shape.
pub fn is_valid_invite_code(code: &str) -> bool {
    INVITE_CODE_REGEX.is_match(code)
}

/// Validates an optional email address for guest participants.
pub fn validate_guest_email(email: &str) -> Result<(), ValidationError> {
    let trimmed = email.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if valid && trimmed.len() <= 254 {
        Ok(())
    } else {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Invalid email address".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("  @Ana.Maria "), "ana.maria");
        assert_eq!(normalize_handle("bruno"), "bruno");
    }

    #[test]
    fn test_validate_handle() {
        assert!(validate_handle("@carlos_99").is_ok());
        assert!(validate_handle("ab").is_err());
        assert!(validate_handle("has space").is_err());
        assert!(validate_handle(&"x".repeat(31)).is_err());
    }

    #[test]
    fn test_invite_code_shape() {
        assert!(is_valid_invite_code("ABC-DEF-234"));
        assert!(!is_valid_invite_code("abc-def-234"));
        assert!(is_valid_invite_code(&normalize_invite_code(" abc-def-234 ")));
        assert!(!is_valid_invite_code("ABCDEF234"));
    }

    #[test]
    fn test_guest_email() {
        assert!(validate_guest_email("ana@example.com").is_ok());
        assert!(validate_guest_email("ana@localhost").is_err());
        assert!(validate_guest_email("@example.com").is_err());
        assert!(validate_guest_email("plain").is_err());
    }
}
