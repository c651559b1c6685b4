//! # Storefront Commands
//!
//! Operations the external HTTP router calls. Each one takes the caller's
//! [`Identity`] (resolved by the external auth collaborator) and only the
//! state it needs.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports, role guard)
//! ├── account.rs   ◄─── Registration, profile and login lookups
//! ├── catalog.rs   ◄─── Game listing and admin catalog management
//! ├── cart.rs      ◄─── Cart manipulation
//! ├── checkout.rs  ◄─── Preview, checkout, direct purchase
//! ├── wallet.rs    ◄─── Balance and top-up
//! ├── library.rs   ◄─── Owned games and order history
//! └── discount.rs  ◄─── Discount code administration
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Router (external)                                                      │
//! │    POST /checkout { code: "FIXED10" }  +  bearer token                  │
//! │         │                                                               │
//! │         │  auth collaborator ──► Identity { user_id, role }             │
//! │         ▼                                                               │
//! │  commands::checkout::checkout(&db, &cache, &identity, Some(code))       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Result<SettlementReceipt, ApiError> ──► ApiResponse::from_result       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod discount;
pub mod library;
pub mod wallet;

use arcade_core::Identity;
use tracing::warn;

use crate::error::ApiError;

/// Fails with `Forbidden` unless the caller is an admin.
pub(crate) fn require_admin(identity: &Identity, action: &str) -> Result<(), ApiError> {
    if identity.is_admin() {
        return Ok(());
    }
    warn!(user_id = %identity.user_id, action = %action, "Admin-only operation refused");
    Err(ApiError::forbidden(action))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use arcade_core::{Game, Identity, Role, User};
    use arcade_db::{Database, DbConfig, NewGame, NewUser, SettlementOptions};

    use crate::state::{CacheState, DbState};

    pub async fn states() -> (DbState, CacheState) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (
            DbState::new(db, SettlementOptions::default()),
            CacheState::new(Duration::from_secs(60), Duration::from_secs(30)),
        )
    }

    pub async fn user(db: &DbState, username: &str, role: Role, balance_cents: i64) -> (User, Identity) {
        let user = db
            .inner()
            .users()
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@test.local"),
                password_hash: "hash".to_string(),
                role,
                balance_cents,
                display_name: None,
            })
            .await
            .unwrap();
        let identity = Identity::new(user.id.clone(), role);
        (user, identity)
    }

    pub async fn game(db: &DbState, name: &str, price_cents: i64) -> Game {
        db.inner()
            .games()
            .create(NewGame {
                name: name.to_string(),
                description: None,
                price_cents,
                category_id: None,
                image_url: None,
            })
            .await
            .unwrap()
    }
}
