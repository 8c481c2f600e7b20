//! Validated input wrappers.
//!
//! Every value coming from a request goes through one of these before it
//! reaches the database: emails and phone numbers are normalised, free text is
//! trimmed, stripped of control characters, refused if it contains HTML and
//! NFKC-normalised.

use ammonia::is_html;
use chrono::NaiveTime;
use derive_more::Display;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::{ValidateEmail, ValidateNonControlCharacter};
use zxcvbn::{zxcvbn, Score};

/// Maximum length for short-form content (names, titles, references)
pub const MAX_SHORT_CONTENT_LENGTH: usize = 250;
/// Maximum length for long-form content (notes, diagnoses, addresses)
pub const MAX_CONTENT_LENGTH: usize = 2_000;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 64;
static MIN_SCORE: Score = Score::Three;

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?1?\d{9,15}$").expect("Failed to compile phone regex")
});

/// Names the field that failed validation, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid {0}")]
pub struct InvalidInput(pub &'static str);

/// A lowercased, syntactically valid email address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct Email(String);

impl Email {
    /// The part before the `@`, used to reject passwords that repeat it.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl TryFrom<&str> for Email {
    type Error = InvalidInput;

    fn try_from(email: &str) -> Result<Self, Self::Error> {
        let trimmed = email.trim();

        if trimmed.is_empty() || trimmed.len() > 254 || !trimmed.validate_email() {
            return Err(InvalidInput("email"));
        }

        Ok(Self(trimmed.to_lowercase()))
    }
}

impl TryFrom<String> for Email {
    type Error = InvalidInput;

    fn try_from(email: String) -> Result<Self, Self::Error> {
        Self::try_from(email.as_str())
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A phone number in international or local digit form, e.g. `+254712345678`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
pub struct PhoneNumber(String);

impl TryFrom<&str> for PhoneNumber {
    type Error = InvalidInput;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if PHONE_REGEX.is_match(&compact) {
            Ok(Self(compact))
        } else {
            Err(InvalidInput("phone number"))
        }
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn clean_text(content: &str, max_length: usize, field: &'static str) -> Result<String, InvalidInput> {
    let trimmed = content.trim();

    if trimmed.chars().count() > max_length
        || !trimmed.validate_non_control_character()
        || is_html(trimmed)
    {
        return Err(InvalidInput(field));
    }

    Ok(trimmed.nfkc().collect())
}

/// Mandatory short text such as a name or a medication.
pub fn short_text(content: &str, field: &'static str) -> Result<String, InvalidInput> {
    let cleaned = clean_text(content, MAX_SHORT_CONTENT_LENGTH, field)?;
    if cleaned.is_empty() {
        return Err(InvalidInput(field));
    }
    Ok(cleaned)
}

/// Mandatory long text such as a diagnosis or an appointment reason.
pub fn long_text(content: &str, field: &'static str) -> Result<String, InvalidInput> {
    let cleaned = clean_text(content, MAX_CONTENT_LENGTH, field)?;
    if cleaned.is_empty() {
        return Err(InvalidInput(field));
    }
    Ok(cleaned)
}

/// Optional long text: absent or blank becomes the empty string.
pub fn optional_text(content: Option<&str>, field: &'static str) -> Result<String, InvalidInput> {
    match content {
        Some(content) => clean_text(content, MAX_CONTENT_LENGTH, field),
        None => Ok(String::new()),
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime, InvalidInput> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| InvalidInput("time"))
}

/// Checks if the given password is strong enough for the given account.
pub fn password_validation(password: &str, account_hint: &str) -> bool {
    if password.eq_ignore_ascii_case(account_hint) {
        return false;
    }

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH || length > MAX_PASSWORD_LENGTH {
        return false;
    }

    zxcvbn(password, &[account_hint]).score() >= MIN_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    mod email_tests {
        use super::*;

        #[test]
        fn test_valid_emails_are_normalised() {
            let email = Email::try_from("  Jane.Doe@Hospital.ORG ").unwrap();
            assert_eq!(email.as_ref(), "jane.doe@hospital.org");
            assert_eq!(email.local_part(), "jane.doe");
        }

        #[test]
        fn test_invalid_emails() {
            let invalid_cases = vec!["", "   ", "not-an-email", "a@", "@b.com", "a b@c.com"];

            for email in invalid_cases {
                assert!(Email::try_from(email).is_err(), "Invalid email {} was accepted !", email);
            }
        }
    }

    mod phone_tests {
        use super::*;

        #[test]
        fn test_valid_phone_numbers() {
            for phone in ["+254712345678", "0712345678", "+1 415 555 0100"] {
                assert!(PhoneNumber::try_from(phone).is_ok(), "Valid phone {} was rejected !", phone);
            }
        }

        #[test]
        fn test_invalid_phone_numbers() {
            for phone in ["12345", "phone", "+25471234567890123", "07-12-34"] {
                assert!(PhoneNumber::try_from(phone).is_err(), "Invalid phone {} was accepted !", phone);
            }
        }
    }

    mod text_tests {
        use super::*;

        #[test]
        fn test_text_is_trimmed() {
            assert_eq!(short_text("  Amoxicillin ", "medication").unwrap(), "Amoxicillin");
        }

        #[test]
        fn test_text_rejections() {
            let too_long = "a".repeat(MAX_SHORT_CONTENT_LENGTH + 1);
            let invalid_cases = vec!["", "   ", "<b>bold</b>", too_long.as_str(), "null\0byte"];

            for content in invalid_cases {
                assert_eq!(short_text(content, "name"), Err(InvalidInput("name")));
            }
        }

        #[test]
        fn test_optional_text() {
            assert_eq!(optional_text(None, "notes").unwrap(), "");
            assert_eq!(optional_text(Some("  "), "notes").unwrap(), "");
            assert!(optional_text(Some("<script>x</script>"), "notes").is_err());
        }

        #[test]
        fn test_unicode_normalisation() {
            // U+FB01 (ligature fi) folds to two letters under NFKC
            assert_eq!(long_text("\u{FB01}brosis", "diagnosis").unwrap(), "fibrosis");
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("08:30").unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(parse_time("16:00:00").unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("noon").is_err());
    }

    mod password_tests {
        use super::*;

        #[test]
        fn test_password_strength_levels() {
            let test_cases = vec![
                ("short", false),
                ("password123", false),
                ("abcdefghijklm", false),
                ("vX7#qL9!mZ2@wK", true),
                ("gentle-Ostrich-quarry-41", true),
            ];

            for (password, expected_valid) in test_cases {
                assert_eq!(
                    password_validation(password, "jdoe"),
                    expected_valid,
                    "Password '{}' validation result was unexpected",
                    password
                );
            }
        }

        #[test]
        fn test_password_length_boundaries() {
            assert!(!password_validation("1234567", "jdoe"));
            assert!(!password_validation(&"Zq9!".repeat(17), "jdoe"));
        }

        #[test]
        fn test_password_equal_to_account_hint() {
            assert!(!password_validation("WardNurse2024", "wardnurse2024"));
        }
    }
}
