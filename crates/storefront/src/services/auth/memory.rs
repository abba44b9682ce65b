//! In-process identity provider.
//!
//! Accounts live in memory with Argon2id password hashes. Emails are not sent;
//! they are appended to an outbox that tests (and local development) read back.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::RwLock;

use hapus_core::validation::MIN_PASSWORD_LENGTH;
use hapus_core::{AuthUser, Email, UserId};

use super::{AuthError, AuthTokens, IdentityProvider, ProviderSession};

/// What an outbox message was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxMessageKind {
    VerifyEmail,
    SignInLink,
}

/// An email the provider would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxMessage {
    pub to: String,
    pub kind: OutboxMessageKind,
    /// One-time code carried by the link.
    pub code: String,
    /// Full link for sign-in emails.
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    uid: UserId,
    email: Email,
    password_hash: Option<String>,
    email_verified: bool,
    disabled: bool,
}

impl Account {
    fn auth_user(&self) -> AuthUser {
        AuthUser {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            email_verified: self.email_verified,
        }
    }
}

#[derive(Debug, Default)]
struct Accounts {
    by_uid: HashMap<UserId, Account>,
    by_email: HashMap<String, UserId>,
    id_tokens: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    /// Sign-in link code -> normalized email.
    sign_in_links: HashMap<String, String>,
    /// Google ID token -> (email, verified at Google).
    google: HashMap<String, (Email, bool)>,
    outbox: Vec<OutboxMessage>,
}

impl Accounts {
    fn by_email(&self, email: &Email) -> Option<&Account> {
        self.by_email
            .get(&email.normalized())
            .and_then(|uid| self.by_uid.get(uid))
    }

    fn insert(&mut self, email: &Email, password_hash: Option<String>, email_verified: bool) -> UserId {
        let uid = UserId::new(random_token(28));
        self.by_email.insert(email.normalized(), uid.clone());
        self.by_uid.insert(
            uid.clone(),
            Account {
                uid: uid.clone(),
                email: email.clone(),
                password_hash,
                email_verified,
                disabled: false,
            },
        );
        uid
    }

    fn issue(&mut self, uid: &UserId) -> Result<ProviderSession, AuthError> {
        let account = self.by_uid.get(uid).ok_or(AuthError::SessionExpired)?;
        if account.disabled {
            return Err(AuthError::UserDisabled);
        }
        let user = account.auth_user();
        let tokens = AuthTokens {
            id_token: random_token(48),
            refresh_token: random_token(48),
        };
        self.id_tokens.insert(tokens.id_token.clone(), uid.clone());
        self.refresh_tokens
            .insert(tokens.refresh_token.clone(), uid.clone());
        Ok(ProviderSession { user, tokens })
    }

    fn account_for(&self, tokens: &AuthTokens) -> Result<&Account, AuthError> {
        let uid = self
            .id_tokens
            .get(&tokens.id_token)
            .ok_or(AuthError::SessionExpired)?;
        let account = self.by_uid.get(uid).ok_or(AuthError::SessionExpired)?;
        if account.disabled {
            return Err(AuthError::UserDisabled);
        }
        Ok(account)
    }
}

/// Memory-backed [`IdentityProvider`].
#[derive(Clone, Default)]
pub struct MemoryIdentityProvider {
    accounts: Arc<RwLock<Accounts>>,
}

impl std::fmt::Debug for MemoryIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIdentityProvider").finish_non_exhaustive()
    }
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the account for `email` as verified, as if the user had clicked
    /// the verification link. Returns `false` for unknown emails.
    pub async fn confirm_email(&self, email: &Email) -> bool {
        let mut accounts = self.accounts.write().await;
        let Some(uid) = accounts.by_email.get(&email.normalized()).cloned() else {
            return false;
        };
        accounts
            .by_uid
            .get_mut(&uid)
            .map(|account| account.email_verified = true)
            .is_some()
    }

    /// Disable the account for `email`. Existing tokens stop working.
    pub async fn disable(&self, email: &Email) -> bool {
        let mut accounts = self.accounts.write().await;
        let Some(uid) = accounts.by_email.get(&email.normalized()).cloned() else {
            return false;
        };
        accounts
            .by_uid
            .get_mut(&uid)
            .map(|account| account.disabled = true)
            .is_some()
    }

    /// Accept `google_id_token` as a Google sign-in for `email`.
    pub async fn register_google_identity(&self, google_id_token: &str, email: Email, verified: bool) {
        self.accounts
            .write()
            .await
            .google
            .insert(google_id_token.to_owned(), (email, verified));
    }

    /// Every email sent so far, oldest first.
    pub async fn outbox(&self) -> Vec<OutboxMessage> {
        self.accounts.read().await.outbox.clone()
    }

    /// The most recent email sent to `email`.
    pub async fn last_email_to(&self, email: &Email) -> Option<OutboxMessage> {
        let normalized = email.normalized();
        self.accounts
            .read()
            .await
            .outbox
            .iter()
            .rev()
            .find(|message| message.to == normalized)
            .cloned()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn register(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.by_email(email).is_some() {
            return Err(AuthError::EmailExists);
        }
        let uid = accounts.insert(email, Some(password_hash), false);
        accounts.issue(&uid)
    }

    async fn login(&self, email: &Email, password: &str) -> Result<ProviderSession, AuthError> {
        let (uid, password_hash) = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .by_email(email)
                .ok_or(AuthError::InvalidCredentials)?;
            let hash = account
                .password_hash
                .clone()
                .ok_or(AuthError::InvalidCredentials)?;
            (account.uid.clone(), hash)
        };

        verify_password(password, &password_hash)?;
        self.accounts.write().await.issue(&uid)
    }

    async fn send_verification_email(&self, tokens: &AuthTokens) -> Result<(), AuthError> {
        let mut accounts = self.accounts.write().await;
        let to = accounts.account_for(tokens)?.email.normalized();
        accounts.outbox.push(OutboxMessage {
            to,
            kind: OutboxMessageKind::VerifyEmail,
            code: random_token(24),
            link: None,
        });
        Ok(())
    }

    async fn send_sign_in_link(&self, email: &Email, continue_url: &str) -> Result<(), AuthError> {
        let code = random_token(24);
        let mut link = url::Url::parse(continue_url)
            .map_err(|_| AuthError::Provider("INVALID_CONTINUE_URI".to_owned()))?;
        link.query_pairs_mut()
            .append_pair("mode", "signIn")
            .append_pair("oobCode", &code);

        let mut accounts = self.accounts.write().await;
        accounts.sign_in_links.insert(code.clone(), email.normalized());
        accounts.outbox.push(OutboxMessage {
            to: email.normalized(),
            kind: OutboxMessageKind::SignInLink,
            code,
            link: Some(link.into()),
        });
        Ok(())
    }

    async fn complete_sign_in_link(
        &self,
        email: &Email,
        oob_code: &str,
    ) -> Result<ProviderSession, AuthError> {
        let mut accounts = self.accounts.write().await;
        match accounts.sign_in_links.get(oob_code) {
            Some(expected) if *expected == email.normalized() => {}
            _ => return Err(AuthError::InvalidLink),
        }
        accounts.sign_in_links.remove(oob_code);

        // Following the link proves ownership of the address.
        let uid = match accounts.by_email(email).map(|a| a.uid.clone()) {
            Some(uid) => {
                if let Some(account) = accounts.by_uid.get_mut(&uid) {
                    account.email_verified = true;
                }
                uid
            }
            None => accounts.insert(email, None, true),
        };
        accounts.issue(&uid)
    }

    async fn sign_in_with_google(
        &self,
        google_id_token: &str,
        _request_uri: &str,
    ) -> Result<ProviderSession, AuthError> {
        let mut accounts = self.accounts.write().await;
        let (email, verified) = accounts
            .google
            .get(google_id_token)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        let uid = match accounts.by_email(&email).map(|a| a.uid.clone()) {
            Some(uid) => {
                if verified && let Some(account) = accounts.by_uid.get_mut(&uid) {
                    account.email_verified = true;
                }
                uid
            }
            None => accounts.insert(&email, None, verified),
        };
        accounts.issue(&uid)
    }

    async fn refresh(&self, tokens: &AuthTokens) -> Result<ProviderSession, AuthError> {
        let accounts = self.accounts.read().await;
        let user = accounts.account_for(tokens)?.auth_user();
        Ok(ProviderSession {
            user,
            tokens: tokens.clone(),
        })
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
