//! Role management commands.
//!
//! These write `userRoles/{uid}` directly, so they work before any admin
//! exists and regardless of `ADMIN_EMAILS`.

use hapus_core::{RoleAction, RoleRecord, UserId};
use hapus_storefront::db::{RoleRepository, UserRepository};
use hapus_storefront::store::DocumentStore;

use super::CommandError;

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unset",
    }
}

#[allow(clippy::print_stdout)]
fn print_record(uid: &UserId, record: RoleRecord) {
    println!("{uid}");
    println!("  admin:     {}", flag(record.admin));
    println!("  suspended: {}", flag(record.suspended));
}

/// Print a user's role record and registration profile.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the store cannot be read.
#[allow(clippy::print_stdout)]
pub async fn show(store: &dyn DocumentStore, uid: &str) -> Result<(), CommandError> {
    let uid = UserId::new(uid);
    let record = RoleRepository::new(store).get(&uid).await?;
    let profile = UserRepository::new(store).get(&uid).await?;

    if record.is_none() && profile.is_none() {
        return Err(CommandError::NotFound(format!("user {uid}")));
    }

    print_record(&uid, record.unwrap_or_default());
    if let Some(profile) = profile {
        println!("  name:      {}", profile.name);
        println!("  email:     {}", profile.email.as_deref().unwrap_or("-"));
        println!("  phone:     {}", profile.phone);
        println!("  pincode:   {}", profile.pincode);
        println!("  joined:    {}", profile.created_at);
    }
    Ok(())
}

/// Apply a role action and print the resulting record.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the write fails.
pub async fn apply(store: &dyn DocumentStore, uid: &str, action: RoleAction) -> Result<(), CommandError> {
    let uid = UserId::new(uid);
    let roles = RoleRepository::new(store);

    roles.update(&uid, action.update()).await?;
    tracing::info!(user_id = %uid, %action, "Role updated");

    let record = roles.get(&uid).await?.unwrap_or_default();
    print_record(&uid, record);
    Ok(())
}
