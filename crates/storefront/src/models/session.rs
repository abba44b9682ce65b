//! Session-related types.
//!
//! Everything a browser session carries between requests: who is signed in,
//! the provider tokens for acting on their behalf, the cart and a few
//! pieces of in-flight flow state.

use serde::{Deserialize, Serialize};

use hapus_core::AuthUser;

use crate::services::auth::{AuthTokens, ProviderSession};

/// Session-stored sign-in.
///
/// The identity context is rebuilt from this when the server has dropped it
/// (idle expiry or restart with a persistent session store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInUser {
    /// The provider's session object at sign-in or last refresh.
    pub user: AuthUser,
    /// Provider tokens. Never sent to the browser.
    pub tokens: AuthTokens,
}

impl From<ProviderSession> for SignedInUser {
    fn from(session: ProviderSession) -> Self {
        Self {
            user: session.user,
            tokens: session.tokens,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user and their tokens.
    pub const SIGNED_IN_USER: &str = "signed_in_user";

    /// Key for the identity context id in the session registry.
    pub const IDENTITY_ID: &str = "identity_id";

    /// Key for storing the cart.
    pub const CART: &str = "cart";

    /// Key for the email a sign-in link was sent to.
    pub const PENDING_LINK_EMAIL: &str = "pending_link_email";

    /// Key for the guard denial tracker (notices fire once per condition).
    pub const DENIALS: &str = "guard_denials";
}
