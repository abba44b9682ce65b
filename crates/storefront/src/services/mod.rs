//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Auth provider boundary (Firebase Identity Toolkit, in-memory)
//! - `identity` - Per-browser identity context and its registry
//! - `accounts` - Registration, sign-in and email verification flows
//! - `orders` - Checkout and the admin order workflow
//! - `roles` - Admin role management and the user directory
//!
//! Services borrow the store (and provider) for the length of a request, like
//! the repositories they are built on.

pub mod accounts;
pub mod auth;
pub mod identity;
pub mod orders;
pub mod roles;

pub use accounts::{AccountError, AccountService};
pub use identity::{SessionContext, SessionRegistry};
pub use orders::{OrderError, OrderService};
pub use roles::{DirectoryEntry, RoleError, RoleService};
