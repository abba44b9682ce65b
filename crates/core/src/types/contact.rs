//! Delivery contact fields: mobile phone number and postal pincode.
//!
//! Delivery is limited to a single local area identified by the pincode
//! prefix [`LOCAL_DELIVERY_PREFIX`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// Pincode prefix of the local delivery area (Mumbai).
pub const LOCAL_DELIVERY_PREFIX: &str = "400";

/// Errors that can occur when parsing contact fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Phone is not a 10-digit mobile number starting with 6-9.
    #[error("phone must be a 10-digit mobile number starting with 6-9")]
    InvalidPhone,
    /// Pincode is not six digits.
    #[error("pincode must be 6 digits")]
    InvalidPincode,
}

/// A 10-digit local mobile number whose leading digit is 6-9.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Parse a phone number.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::InvalidPhone` unless the trimmed input matches
    /// `^[6-9][0-9]{9}$`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        let leading_ok = matches!(s.chars().next(), Some('6'..='9'));
        if !leading_ok || s.len() != 10 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ContactError::InvalidPhone);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A six-digit postal pincode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pincode(String);

impl Pincode {
    /// Parse a pincode.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::InvalidPincode` unless the trimmed input is six
    /// ASCII digits.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ContactError::InvalidPincode);
        }
        Ok(Self(s.to_owned()))
    }

    /// Whether this pincode lies in the local delivery area.
    #[must_use]
    pub fn is_local_delivery(&self) -> bool {
        self.0.starts_with(LOCAL_DELIVERY_PREFIX)
    }

    /// Returns the pincode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_accepts_local_mobile() {
        assert!(Phone::parse("9876543210").is_ok());
        assert!(Phone::parse("6000000000").is_ok());
        assert!(Phone::parse(" 7012345678 ").is_ok());
    }

    #[test]
    fn test_phone_rejects_bad_leading_digit_and_length() {
        assert_eq!(Phone::parse("5876543210"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse("987654321"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse("98765432101"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse("98765x3210"), Err(ContactError::InvalidPhone));
        assert_eq!(Phone::parse(""), Err(ContactError::InvalidPhone));
    }

    #[test]
    fn test_pincode_local_delivery() {
        let mumbai = Pincode::parse("400050");
        assert!(mumbai.is_ok_and(|p| p.is_local_delivery()));

        let delhi = Pincode::parse("110001");
        assert!(delhi.is_ok_and(|p| !p.is_local_delivery()));
    }

    #[test]
    fn test_pincode_rejects_non_six_digits() {
        assert_eq!(Pincode::parse("4000"), Err(ContactError::InvalidPincode));
        assert_eq!(Pincode::parse("40005a"), Err(ContactError::InvalidPincode));
    }
}
