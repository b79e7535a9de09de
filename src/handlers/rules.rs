//! Field rules shared by request bodies.

use std::borrow::Cow;

use validator::ValidationError;

pub const DOCUMENT_TYPES: [&str; 5] = ["CC", "TI", "CE", "PP", "NIT"];

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Unicode letters and spaces, at least one letter.
pub fn letters_only(value: &str) -> Result<(), ValidationError> {
    let has_letter = value.chars().any(char::is_alphabetic);
    if has_letter && value.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(invalid("letters_only", "solo se permiten letras"))
    }
}

pub fn digits_only(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("digits_only", "solo se permiten números"))
    }
}

pub fn document_type(value: &str) -> Result<(), ValidationError> {
    if DOCUMENT_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(invalid("document_type", "tipo de documento no válido"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_accept_accents_and_spaces() {
        assert!(letters_only("María José").is_ok());
        assert!(letters_only("Ñandú").is_ok());
        assert!(letters_only("Ana2").is_err());
        assert!(letters_only("   ").is_err());
    }

    #[test]
    fn test_digits() {
        assert!(digits_only("3001234567").is_ok());
        assert!(digits_only("300-123").is_err());
        assert!(digits_only("").is_err());
    }

    #[test]
    fn test_document_types() {
        assert!(document_type("CC").is_ok());
        assert!(document_type("NIT").is_ok());
        assert!(document_type("cc").is_err());
    }
}
