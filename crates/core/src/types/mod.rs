//! Core types for Devgad Hapus.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod timestamp;

pub use contact::{ContactError, LOCAL_DELIVERY_PREFIX, Phone, Pincode};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use status::*;
pub use timestamp::Timestamp;
