//! Status enums for orders and order messages.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Orders start as `Pending` and are moved to `Confirmed` or `Rejected` by
/// staff. Both of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl OrderStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Confirmed, Self::Rejected];

    /// Whether no further transition is intended from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Who wrote an order message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Admin,
    User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_wire_format_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Confirmed).ok().as_deref(),
            Some("\"confirmed\"")
        );
        assert_eq!(
            serde_json::to_string(&SenderRole::Admin).ok().as_deref(),
            Some("\"admin\"")
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Rejected".parse::<OrderStatus>(), Ok(OrderStatus::Rejected));
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
