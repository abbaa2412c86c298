//! Buyer contact channels.
//!
//! Phone numbers double as the verification key: every lookup in the
//! verification table goes through [`Phone::key`], which keeps digits only so
//! `+91 98765-43210` and `919876543210` address the same record.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a contact channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("contact cannot be empty")]
    Empty,
    /// The phone number has too few or too many digits.
    #[error("phone number must have between {min} and {max} digits (got {got})")]
    PhoneLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
        /// Digits found in the input.
        got: usize,
    },
    /// The email is longer than RFC 5321 allows.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not of the form `local@domain`.
    #[error("email must look like name@domain")]
    MalformedEmail,
}

/// A phone number, stored in digits-only form.
///
/// ## Examples
///
/// ```
/// use marigold_core::Phone;
///
/// let phone = Phone::parse("+91 98765-43210").unwrap();
/// assert_eq!(phone.key(), "919876543210");
///
/// assert!(Phone::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Fewest digits accepted (national number without trunk prefix).
    pub const MIN_DIGITS: usize = 10;
    /// Most digits accepted (E.164 maximum).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a phone number, discarding every non-digit character.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or the digit count falls
    /// outside `MIN_DIGITS..=MAX_DIGITS`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        if s.trim().is_empty() {
            return Err(ContactError::Empty);
        }

        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(ContactError::PhoneLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
                got: digits.len(),
            });
        }

        Ok(Self(digits))
    }

    /// The normalized, digits-only form used as a lookup key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.0
    }

    /// The last ten digits, which is what domestic carriers expect.
    #[must_use]
    pub fn national(&self) -> &str {
        let start = self.0.len().saturating_sub(Self::MIN_DIGITS);
        self.0.get(start..).unwrap_or(&self.0)
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

impl std::str::FromStr for Phone {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An email address, trimmed and lowercased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or lacks a non-empty
    /// local part and a dotted domain around a single `@`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ContactError::Empty);
        }
        if normalized.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(ContactError::MalformedEmail);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.')
        {
            return Err(ContactError::MalformedEmail);
        }

        Ok(Self(normalized))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_normalizes_to_digits() {
        let phone = Phone::parse("(987) 654-3210").unwrap();
        assert_eq!(phone.key(), "9876543210");
    }

    #[test]
    fn test_phone_formats_share_a_key() {
        let a = Phone::parse("+91 98765 43210").unwrap();
        let b = Phone::parse("919876543210").unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_phone_national_part() {
        let phone = Phone::parse("+91 98765 43210").unwrap();
        assert_eq!(phone.national(), "9876543210");
    }

    #[test]
    fn test_phone_rejects_short_numbers() {
        assert!(matches!(
            Phone::parse("555-1234"),
            Err(ContactError::PhoneLength { got: 7, .. })
        ));
    }

    #[test]
    fn test_phone_rejects_blank() {
        assert_eq!(Phone::parse("   "), Err(ContactError::Empty));
    }

    #[test]
    fn test_phone_deserialize_validates() {
        let ok: Result<Phone, _> = serde_json::from_str("\"+1 (415) 555-0100\"");
        assert_eq!(ok.unwrap().key(), "14155550100");

        let bad: Result<Phone, _> = serde_json::from_str("\"abc\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_email_is_lowercased() {
        let email = Email::parse("  Buyer@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "buyer@example.com");
    }

    #[test]
    fn test_email_rejects_malformed() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty));
        assert_eq!(Email::parse("no-at"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("@example.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("user@localhost"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c.com"), Err(ContactError::MalformedEmail));
    }

    #[test]
    fn test_email_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(ContactError::EmailTooLong { .. })
        ));
    }
}
