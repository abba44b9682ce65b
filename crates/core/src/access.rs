//! Route guard policies.
//!
//! A guard looks at the current [`SessionView`] and decides whether a protected
//! page may render, must wait for the session to settle, or must redirect. The
//! check order is fixed: loading, suspended, signed out, unverified, and for
//! the admin policy, not admin.

use serde::{Deserialize, Serialize};

use crate::identity::SessionView;

/// Which pages a guard protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    /// Checkout and order history.
    Authenticated,
    /// The admin console.
    Admin,
}

/// Where a redirect goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Home,
    SignIn,
    VerifyEmail,
}

impl RedirectTarget {
    /// Client route for this target.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::SignIn => "/auth",
            Self::VerifyEmail => "/verify-email",
        }
    }
}

/// Why a guard refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    SignInRequired,
    Suspended,
    EmailUnverified,
    AdminOnly,
}

impl Denial {
    /// User-facing notice for this denial under `policy`.
    #[must_use]
    pub const fn message(self, policy: GuardPolicy) -> &'static str {
        match (self, policy) {
            (Self::SignInRequired, _) => "Please log in to continue",
            (Self::Suspended, GuardPolicy::Authenticated) => {
                "Your account has been suspended. Contact support."
            }
            (Self::Suspended, GuardPolicy::Admin) => "Your account has been suspended.",
            (Self::EmailUnverified, GuardPolicy::Authenticated) => {
                "Please verify your email to continue."
            }
            (Self::EmailUnverified, GuardPolicy::Admin) => "Please verify your email first.",
            (Self::AdminOnly, _) => "Admin access only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub target: RedirectTarget,
    /// Originally requested path, to return to after the redirect is resolved.
    pub from: Option<String>,
    pub denial: Denial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still resolving.
    Wait,
    Render,
    Redirect(Redirect),
}

impl GuardPolicy {
    /// Evaluate this policy for a request to `requested_path`.
    #[must_use]
    pub fn evaluate(self, view: &SessionView, requested_path: &str) -> GuardDecision {
        if view.loading {
            return GuardDecision::Wait;
        }
        let redirect = |target, from: bool, denial| {
            GuardDecision::Redirect(Redirect {
                target,
                from: from.then(|| requested_path.to_owned()),
                denial,
            })
        };

        if view.is_suspended {
            return redirect(RedirectTarget::Home, false, Denial::Suspended);
        }
        if view.user.is_none() {
            return redirect(RedirectTarget::SignIn, true, Denial::SignInRequired);
        }
        if !view.is_email_verified {
            let remember = self == Self::Authenticated;
            return redirect(RedirectTarget::VerifyEmail, remember, Denial::EmailUnverified);
        }
        if self == Self::Admin && !view.is_admin {
            return redirect(RedirectTarget::Home, false, Denial::AdminOnly);
        }
        GuardDecision::Render
    }
}

/// Fires each denial notice once per run of the same condition.
///
/// Feed it the denial of every evaluation (or `None` when the guard renders or
/// waits); it returns the denial only when it differs from the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialTracker {
    last: Option<Denial>,
}

impl DenialTracker {
    pub fn observe(&mut self, current: Option<Denial>) -> Option<Denial> {
        let fresh = current.filter(|denial| self.last != Some(*denial));
        self.last = current;
        fresh
    }
}
