//! Form validation.
//!
//! Everything here runs before any network call. Checks run in a fixed order
//! and stop at the first failure so the customer sees one message at a time.

use core::fmt;

use serde::Deserialize;

use crate::types::{Email, Phone, Pincode};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Which form a validation message belongs to.
///
/// The checkout and registration forms word some messages differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Checkout,
    Registration,
}

impl FormKind {
    const fn missing_fields(self) -> &'static str {
        match self {
            Self::Checkout => "Please fill all required fields",
            Self::Registration => "Please fill all fields",
        }
    }

    const fn outside_delivery_area(self) -> &'static str {
        match self {
            Self::Checkout => {
                "Sorry, we only deliver in Mumbai. Please enter a valid Mumbai pincode."
            }
            Self::Registration => "Only Mumbai pincodes accepted (400XXX)",
        }
    }
}

/// A user-correctable problem with submitted input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", .0.missing_fields())]
    MissingFields(FormKind),
    #[error("{}", .0.outside_delivery_area())]
    PincodeOutsideDeliveryArea(FormKind),
    #[error("Enter a valid phone number")]
    InvalidPhone,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Please enter a message")]
    EmptyMessage,
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn local_pincode(raw: &str, kind: FormKind) -> Result<Pincode, ValidationError> {
    Pincode::parse(raw)
        .ok()
        .filter(Pincode::is_local_delivery)
        .ok_or(ValidationError::PincodeOutsideDeliveryArea(kind))
}

/// Checkout form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Delivery contact that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContact {
    pub name: String,
    pub phone: Phone,
    pub address: String,
    pub pincode: Pincode,
    pub notes: Option<String>,
}

impl CheckoutForm {
    /// Required fields, then pincode, then phone.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(&self) -> Result<DeliveryContact, ValidationError> {
        let kind = FormKind::Checkout;
        if [&self.name, &self.phone, &self.address, &self.pincode]
            .into_iter()
            .any(|field| blank(field))
        {
            return Err(ValidationError::MissingFields(kind));
        }
        let pincode = local_pincode(&self.pincode, kind)?;
        let phone = Phone::parse(&self.phone).map_err(|_| ValidationError::InvalidPhone)?;

        Ok(DeliveryContact {
            name: self.name.trim().to_owned(),
            phone,
            address: self.address.trim().to_owned(),
            pincode,
            notes: self
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
        })
    }
}

/// Registration form as submitted.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("address", &self.address)
            .field("pincode", &self.pincode)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .finish()
    }
}

/// Registration details that passed validation.
#[derive(Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub address: String,
    pub pincode: Pincode,
    pub password: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("pincode", &self.pincode)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RegistrationForm {
    /// Required fields, password match, password length, pincode, phone,
    /// then email shape.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate(&self) -> Result<NewAccount, ValidationError> {
        let kind = FormKind::Registration;
        if [
            &self.name,
            &self.email,
            &self.phone,
            &self.address,
            &self.pincode,
            &self.password,
        ]
        .into_iter()
        .any(|field| blank(field))
        {
            return Err(ValidationError::MissingFields(kind));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        let pincode = local_pincode(&self.pincode, kind)?;
        let phone = Phone::parse(&self.phone).map_err(|_| ValidationError::InvalidPhone)?;
        let email = Email::parse(&self.email).map_err(|_| ValidationError::InvalidEmail)?;

        Ok(NewAccount {
            name: self.name.trim().to_owned(),
            email,
            phone,
            address: self.address.trim().to_owned(),
            pincode,
            password: self.password.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkout(pincode: &str, phone: &str) -> CheckoutForm {
        CheckoutForm {
            name: "Asha Patil".to_owned(),
            phone: phone.to_owned(),
            address: "12 Marine Drive".to_owned(),
            pincode: pincode.to_owned(),
            notes: Some("  ".to_owned()),
        }
    }

    fn registration() -> RegistrationForm {
        RegistrationForm {
            name: "Asha Patil".to_owned(),
            email: "asha@example.in".to_owned(),
            phone: "9876543210".to_owned(),
            address: "12 Marine Drive".to_owned(),
            pincode: "400050".to_owned(),
            password: "alphonso".to_owned(),
            confirm_password: "alphonso".to_owned(),
        }
    }

    #[test]
    fn test_checkout_valid() {
        let contact = checkout("400001", "9876543210").validate().unwrap();
        assert_eq!(contact.pincode.as_str(), "400001");
        assert_eq!(contact.notes, None);
    }

    #[test]
    fn test_checkout_rejects_non_local_pincode() {
        let err = checkout("110001", "9876543210").validate().unwrap_err();
        assert_eq!(err, ValidationError::PincodeOutsideDeliveryArea(FormKind::Checkout));
        assert_eq!(
            err.to_string(),
            "Sorry, we only deliver in Mumbai. Please enter a valid Mumbai pincode."
        );
    }

    #[test]
    fn test_checkout_check_order() {
        let mut form = checkout("110001", "123");
        form.name = String::new();
        assert_eq!(
            form.validate().unwrap_err(),
            ValidationError::MissingFields(FormKind::Checkout)
        );
        assert_eq!(
            checkout("110001", "123").validate().unwrap_err(),
            ValidationError::PincodeOutsideDeliveryArea(FormKind::Checkout)
        );
        assert_eq!(
            checkout("400001", "5876543210").validate().unwrap_err(),
            ValidationError::InvalidPhone
        );
    }

    #[test]
    fn test_registration_valid() {
        let account = registration().validate().unwrap();
        assert_eq!(account.email.as_str(), "asha@example.in");
        assert!(!format!("{account:?}").contains("alphonso"));
    }

    #[test]
    fn test_registration_password_rules() {
        let mut form = registration();
        form.confirm_password = "different".to_owned();
        assert_eq!(form.validate().unwrap_err(), ValidationError::PasswordMismatch);

        form.password = "abc".to_owned();
        form.confirm_password = "abc".to_owned();
        assert_eq!(
            form.validate().unwrap_err().to_string(),
            "Password must be at least 6 characters"
        );
    }

    #[test]
    fn test_registration_messages() {
        let mut form = registration();
        form.pincode = "411001".to_owned();
        assert_eq!(
            form.validate().unwrap_err().to_string(),
            "Only Mumbai pincodes accepted (400XXX)"
        );

        let mut form = registration();
        form.address = " ".to_owned();
        assert_eq!(form.validate().unwrap_err().to_string(), "Please fill all fields");

        let mut form = registration();
        form.email = "not-an-email".to_owned();
        assert_eq!(form.validate().unwrap_err(), ValidationError::InvalidEmail);
    }

    #[test]
    fn test_registration_form_debug_redacts_password() {
        assert!(!format!("{:?}", registration()).contains("alphonso"));
    }
}
