//! Customer profiles stored at `users/{uid}`.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};
use crate::validation::NewAccount;

/// Profile captured at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pincode: String,
    pub created_at: Timestamp,
}

impl UserProfile {
    #[must_use]
    pub fn from_account(uid: UserId, account: &NewAccount, now: Timestamp) -> Self {
        Self {
            uid,
            name: account.name.clone(),
            email: Some(account.email.as_str().to_owned()),
            phone: account.phone.as_str().to_owned(),
            address: account.address.clone(),
            pincode: account.pincode.as_str().to_owned(),
            created_at: now,
        }
    }
}
