//! Devgad Hapus Core - Shared domain library.
//!
//! This crate provides the domain model used by every Devgad Hapus component:
//! - `storefront` - The storefront service (shop, checkout, admin console)
//! - `cli` - Operator tooling for roles and orders
//!
//! # Architecture
//!
//! The core crate contains only types and state machines - no I/O, no store
//! access, no HTTP clients. Everything that talks to the hosted document store
//! or the auth provider lives in the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, phones, pincodes, prices and statuses
//! - [`catalog`] - The fixed product catalog
//! - [`cart`] - Session cart with derived totals
//! - [`role`] - Role records, the admin allow-list and effective roles
//! - [`identity`] - Session identity state machine
//! - [`access`] - Route guard policies
//! - [`order`] - Order documents, messages and status buckets
//! - [`profile`] - Customer profiles captured at registration
//! - [`validation`] - Form validation performed before any network call

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod access;
pub mod cart;
pub mod catalog;
pub mod identity;
pub mod order;
pub mod profile;
pub mod role;
pub mod types;
pub mod validation;

pub use access::{Denial, DenialTracker, GuardDecision, GuardPolicy, Redirect, RedirectTarget};
pub use cart::{Cart, CartLine};
pub use catalog::Product;
pub use identity::{AuthUser, IdentityState, RoleWatchCommand, SessionView};
pub use order::{
    CustomerDetails, Order, OrderBuckets, OrderLine, OrderMessage, OrderRecord, owned_by,
};
pub use profile::UserProfile;
pub use role::{AdminAllowList, EffectiveRole, RoleAction, RoleRecord, RoleUpdate};
pub use types::*;
pub use validation::{
    CheckoutForm, DeliveryContact, FormKind, NewAccount, RegistrationForm, ValidationError,
};
