//! Per-browser identity context.
//!
//! A [`SessionContext`] owns one [`IdentityState`] and at most one live role
//! subscription. Handlers never share identity through globals: each browser
//! session gets its own context from the [`SessionRegistry`], and everything
//! that needs the current [`SessionView`] reads it from there.
//!
//! Role snapshots are applied by a background task tagged with a generation
//! number. Every sign-in, sign-out or user switch bumps the generation and
//! aborts the previous task, so a snapshot that was already in flight for the
//! previous user is discarded instead of leaking into the new session.

use std::sync::{Arc, Weak};
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, watch};
use tokio::task::AbortHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use hapus_core::{AdminAllowList, AuthUser, IdentityState, RoleWatchCommand, SessionView, UserId};

use crate::db::roles::{RoleRepository, decode_snapshot};
use crate::db::{RepositoryError, USER_ROLES};
use crate::store::DocumentStore;

// =============================================================================
// SessionContext
// =============================================================================

/// Identity of one browser session.
///
/// Cheap to clone. The role subscription is torn down when the last clone is
/// dropped.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    store: Arc<dyn DocumentStore>,
    allow: Arc<AdminAllowList>,
    state: Mutex<ContextState>,
    view: watch::Sender<SessionView>,
}

#[derive(Default)]
struct ContextState {
    identity: IdentityState,
    generation: u64,
    role_watch: Option<AbortHandle>,
}

impl ContextState {
    /// Drop the current role subscription and invalidate anything it may
    /// still deliver.
    fn stop_role_watch(&mut self) {
        if let Some(handle) = self.role_watch.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().role_watch.take() {
            handle.abort();
        }
    }
}

impl SessionContext {
    /// Create a signed-out context.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, allow: Arc<AdminAllowList>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                store,
                allow,
                state: Mutex::new(ContextState::default()),
                view: watch::Sender::new(SessionView::signed_out()),
            }),
        }
    }

    /// The current view.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    /// The current view once it is no longer loading, or the loading view if
    /// `wait` elapses first.
    pub async fn ready(&self, wait: Duration) -> SessionView {
        let mut rx = self.inner.view.subscribe();
        let settled = tokio::time::timeout(wait, rx.wait_for(|view| !view.loading))
            .await
            .ok()
            .and_then(Result::ok)
            .map(|view| (*view).clone());
        settled.unwrap_or_else(|| rx.borrow().clone())
    }

    /// Feed a new auth session, or `None` on sign-out.
    ///
    /// Signing in as the same user only refreshes the session object (and
    /// with it `is_email_verified`); the role subscription is left alone.
    #[instrument(skip_all, fields(user_id = user.as_ref().map(|u| u.uid.as_str())))]
    pub async fn set_user(&self, user: Option<AuthUser>) {
        let mut state = self.inner.state.lock().await;
        match state.identity.auth_changed(user) {
            RoleWatchCommand::Keep => {}
            RoleWatchCommand::Stop => {
                debug!("signed out, stopping role watch");
                state.stop_role_watch();
            }
            RoleWatchCommand::Start(uid) => {
                state.stop_role_watch();
                debug!(user_id = %uid, "starting role watch");
                let task = tokio::spawn(watch_role(
                    Arc::downgrade(&self.inner),
                    Arc::clone(&self.inner.store),
                    uid,
                    state.generation,
                ));
                state.role_watch = Some(task.abort_handle());
            }
        }
        self.inner.view.send_replace(state.identity.view());
    }
}

impl ContextInner {
    /// Apply a role outcome if it still belongs to the current generation.
    async fn settle(
        &self,
        generation: u64,
        apply: impl FnOnce(&mut IdentityState, &AdminAllowList) -> bool,
    ) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        if apply(&mut state.identity, &self.allow) {
            self.view.send_replace(state.identity.view());
        }
    }
}

/// Follow the role record of `uid` until the subscription ends, the context
/// is dropped or the task is aborted.
async fn watch_role(
    context: Weak<ContextInner>,
    store: Arc<dyn DocumentStore>,
    uid: UserId,
    generation: u64,
) {
    let path = format!("{USER_ROLES}/{uid}");
    let repo = RoleRepository::new(store.as_ref());

    let failure = match repo.subscribe(&uid).await {
        Ok(mut subscription) => loop {
            let Some(item) = subscription.next().await else {
                break None;
            };
            let record = match item.map_err(RepositoryError::from) {
                Ok(snapshot) => decode_snapshot(&path, snapshot),
                Err(err) => Err(err),
            };
            let Some(inner) = context.upgrade() else {
                return;
            };
            match record {
                Ok(record) => {
                    inner
                        .settle(generation, |identity, allow| {
                            identity.role_resolved(&uid, record.as_ref(), allow)
                        })
                        .await;
                }
                Err(err) => break Some(err),
            }
        },
        Err(err) => Some(err),
    };

    let Some(inner) = context.upgrade() else {
        return;
    };
    let failed = failure.is_some();
    match failure {
        Some(err) => {
            warn!(user_id = %uid, error = %err, "role subscription failed, using allow-list");
        }
        None => debug!(user_id = %uid, "role subscription ended"),
    }
    // An ended subscription only matters if it never delivered; an error
    // always drops back to the allow-list.
    inner
        .settle(generation, |identity, allow| {
            let loading = matches!(identity, IdentityState::AuthenticatingRole { .. });
            (failed || loading) && identity.role_failed(&uid, allow)
        })
        .await;
}

// =============================================================================
// SessionRegistry
// =============================================================================

/// One [`SessionContext`] per browser session, expiring after a period of
/// inactivity.
#[derive(Clone)]
pub struct SessionRegistry {
    contexts: Cache<Uuid, SessionContext>,
    store: Arc<dyn DocumentStore>,
    allow: Arc<AdminAllowList>,
}

impl SessionRegistry {
    /// Create a registry whose contexts expire after `idle` without access.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, allow: Arc<AdminAllowList>, idle: Duration) -> Self {
        let contexts = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(idle)
            .build();

        Self {
            contexts,
            store,
            allow,
        }
    }

    /// The context for `id`, creating a signed-out one if there is none.
    ///
    /// The returned flag is `true` when the context was just created, so the
    /// caller can restore the signed-in user from the browser session.
    pub async fn get_or_create(&self, id: Uuid) -> (SessionContext, bool) {
        let entry = self
            .contexts
            .entry(id)
            .or_insert_with(async {
                SessionContext::new(Arc::clone(&self.store), Arc::clone(&self.allow))
            })
            .await;
        let fresh = entry.is_fresh();
        (entry.into_value(), fresh)
    }

    /// Forget the context for `id` and hand it back. Its role subscription
    /// stops once no request is using it any more.
    pub async fn remove(&self, id: Uuid) -> Option<SessionContext> {
        self.contexts.remove(&id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hapus_core::{Email, RoleRecord};
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    const WAIT: Duration = Duration::from_secs(2);

    fn user(uid: &str, email: &str, verified: bool) -> AuthUser {
        AuthUser {
            uid: UserId::new(uid),
            email: Some(Email::parse(email).unwrap()),
            email_verified: verified,
        }
    }

    fn context(store: &MemoryStore, allow: &str) -> SessionContext {
        SessionContext::new(Arc::new(store.clone()), Arc::new(AdminAllowList::parse(allow)))
    }

    #[tokio::test]
    async fn test_signed_out_by_default() {
        let store = MemoryStore::new();
        let ctx = context(&store, "");
        assert_eq!(ctx.view(), SessionView::signed_out());
        assert_eq!(ctx.ready(WAIT).await, SessionView::signed_out());
    }

    #[tokio::test]
    async fn test_loading_until_role_arrives() {
        let store = MemoryStore::new();
        store
            .set("userRoles/u1", json!({"admin": true}))
            .await
            .unwrap();
        let ctx = context(&store, "");
        let mut rx = ctx.inner.view.subscribe();

        ctx.set_user(Some(user("u1", "a@example.in", true))).await;
        assert!(rx.borrow_and_update().loading);

        let view = ctx.ready(WAIT).await;
        assert!(!view.loading);
        assert!(view.is_admin);
        assert!(view.is_email_verified);
    }

    #[tokio::test]
    async fn test_role_changes_are_pushed() {
        let store = MemoryStore::new();
        let ctx = context(&store, "");
        ctx.set_user(Some(user("u1", "a@example.in", true))).await;
        assert!(!ctx.ready(WAIT).await.is_admin);

        let mut rx = ctx.inner.view.subscribe();
        store
            .set("userRoles/u1", json!({"admin": true, "suspended": true}))
            .await
            .unwrap();
        let view = rx.wait_for(|v| v.is_suspended).await.unwrap().clone();
        assert!(!view.is_admin);
    }

    #[tokio::test]
    async fn test_subscription_error_falls_back_to_allow_list() {
        let store = MemoryStore::new();
        store.deny("userRoles").await;
        let ctx = context(&store, "boss@example.in");

        ctx.set_user(Some(user("u1", "Boss@Example.in", true))).await;
        let view = ctx.ready(WAIT).await;
        assert!(view.is_admin);
        assert!(!view.is_suspended);

        ctx.set_user(Some(user("u2", "guest@example.in", true))).await;
        let view = ctx.ready(WAIT).await;
        assert!(!view.is_admin);
    }

    #[tokio::test]
    async fn test_switching_users_drops_previous_role() {
        let store = MemoryStore::new();
        RoleRepository::new(&store)
            .put(&UserId::new("admin"), RoleRecord { admin: Some(true), suspended: None })
            .await
            .unwrap();
        let ctx = context(&store, "");

        ctx.set_user(Some(user("admin", "a@example.in", true))).await;
        assert!(ctx.ready(WAIT).await.is_admin);

        ctx.set_user(Some(user("other", "o@example.in", true))).await;
        let view = ctx.ready(WAIT).await;
        assert_eq!(view.user.unwrap().uid.as_str(), "other");
        assert!(!view.is_admin);

        store
            .set("userRoles/admin", json!({"admin": true, "suspended": false}))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(!ctx.view().is_admin);
    }

    #[tokio::test]
    async fn test_sign_out_resets_view() {
        let store = MemoryStore::new();
        let ctx = context(&store, "a@example.in");
        ctx.set_user(Some(user("u1", "a@example.in", true))).await;
        assert!(ctx.ready(WAIT).await.is_admin);

        ctx.set_user(None).await;
        assert_eq!(ctx.view(), SessionView::signed_out());
    }

    #[tokio::test]
    async fn test_same_user_refreshes_verification() {
        let store = MemoryStore::new();
        let ctx = context(&store, "");
        ctx.set_user(Some(user("u1", "a@example.in", false))).await;
        assert!(!ctx.ready(WAIT).await.is_email_verified);

        ctx.set_user(Some(user("u1", "a@example.in", true))).await;
        let view = ctx.view();
        assert!(!view.loading);
        assert!(view.is_email_verified);
    }

    #[tokio::test]
    async fn test_registry_reuses_contexts() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new(
            Arc::new(store),
            Arc::new(AdminAllowList::default()),
            Duration::from_secs(60),
        );
        let id = Uuid::new_v4();

        let (first, fresh) = registry.get_or_create(id).await;
        assert!(fresh);
        first.set_user(Some(user("u1", "a@example.in", true))).await;

        let (second, fresh) = registry.get_or_create(id).await;
        assert!(!fresh);
        assert_eq!(second.view().user.unwrap().uid.as_str(), "u1");

        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none());
        let (third, fresh) = registry.get_or_create(id).await;
        assert!(fresh);
        assert!(third.view().user.is_none());
    }
}
