//! # Library Commands
//!
//! Owned games and order history. Both are written only by settlement.

use arcade_core::{Identity, Order, OwnedGame};
use tracing::debug;

use crate::error::ApiError;
use crate::state::DbState;

/// Games the caller owns, most recently acquired first.
pub async fn get_library(db: &DbState, identity: &Identity) -> Result<Vec<OwnedGame>, ApiError> {
    debug!(user_id = %identity.user_id, "get_library command");
    Ok(db.inner().library().list_library(&identity.user_id).await?)
}

/// The caller's orders, newest first.
pub async fn list_orders(db: &DbState, identity: &Identity) -> Result<Vec<Order>, ApiError> {
    debug!(user_id = %identity.user_id, "list_orders command");
    Ok(db.inner().orders().list_for_user(&identity.user_id).await?)
}
