//! # Cart Commands
//!
//! Cart manipulation. Settlement reads and clears the cart itself; these
//! commands only shape what it will find there.
//!
//! ## Add Flow
//! ```text
//! add_to_cart(game, qty)
//!      │
//!      ├── qty out of range ──────────────► ValidationError
//!      ├── game missing / inactive ───────► NotFound / ValidationError
//!      ├── game already in library ───────► AlreadyOwned
//!      ├── new line, cart full ───────────► CartError
//!      ├── merged qty > MAX_ITEM_QUANTITY ► ValidationError
//!      ▼
//!   upsert cart row (qty += requested)
//! ```

use arcade_core::pricing::{resolve_quote, unavailable_lines};
use arcade_core::validation::{validate_cart_size, validate_quantity};
use arcade_core::{CartItem, CartLine, CoreError, Identity, Quote, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::DbState;

/// The cart as stored plus its current price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    /// Every row, inactive games included so the buyer can remove them.
    pub lines: Vec<CartLine>,
    /// Available lines priced at today's catalog prices, owned games dropped.
    pub quote: Quote,
    /// Delisted games the buyer does not own. Checkout refuses the cart
    /// until these are removed.
    pub unavailable: Vec<String>,
}

pub async fn get_cart(db: &DbState, identity: &Identity) -> Result<CartResponse, ApiError> {
    debug!(user_id = %identity.user_id, "get_cart command");

    let lines = db.inner().cart().list_items(&identity.user_id).await?;
    let owned = db.inner().library().owned_set(&identity.user_id).await?;

    let unavailable = unavailable_lines(&lines, &owned);
    let available: Vec<CartLine> = lines
        .iter()
        .filter(|l| !unavailable.contains(&l.game_id))
        .cloned()
        .collect();
    let quote = resolve_quote(&available, &owned, None, &identity.user_id, Utc::now());

    Ok(CartResponse {
        lines,
        quote,
        unavailable,
    })
}

/// Adds a game to the caller's cart. `quantity` defaults to 1.
pub async fn add_to_cart(
    db: &DbState,
    identity: &Identity,
    game_id: &str,
    quantity: Option<i64>,
) -> Result<CartItem, ApiError> {
    let quantity = quantity.unwrap_or(1);
    debug!(user_id = %identity.user_id, game_id = %game_id, quantity, "add_to_cart command");

    validate_quantity(quantity).map_err(CoreError::from)?;

    let game = db
        .inner()
        .games()
        .get_by_id(game_id)
        .await?
        .ok_or_else(|| CoreError::GameNotFound(game_id.to_string()))?;
    if !game.is_active {
        return Err(CoreError::GameInactive(game_id.to_string()).into());
    }

    if db.inner().library().owns(&identity.user_id, game_id).await? {
        return Err(CoreError::AlreadyOwned(game_id.to_string()).into());
    }

    let cart = db.inner().cart();
    if cart.get_quantity(&identity.user_id, game_id).await?.is_none() {
        let current = cart.count_items(&identity.user_id).await?;
        validate_cart_size(current).map_err(|_| CoreError::CartTooLarge { max: MAX_CART_ITEMS })?;
    }

    let item = cart
        .add_item(&identity.user_id, game_id, quantity, MAX_ITEM_QUANTITY)
        .await?
        .ok_or(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        })?;

    info!(
        user_id = %identity.user_id,
        game_id = %game_id,
        quantity = item.quantity,
        "Game added to cart"
    );
    Ok(item)
}

pub async fn remove_from_cart(db: &DbState, identity: &Identity, game_id: &str) -> Result<(), ApiError> {
    debug!(user_id = %identity.user_id, game_id = %game_id, "remove_from_cart command");

    match db.inner().cart().remove_item(&identity.user_id, game_id).await {
        Ok(()) => Ok(()),
        Err(arcade_db::DbError::NotFound { .. }) => Err(CoreError::NotInCart(game_id.to_string()).into()),
        Err(e) => Err(e.into()),
    }
}

/// Empties the cart. Returns how many rows went.
pub async fn clear_cart(db: &DbState, identity: &Identity) -> Result<u64, ApiError> {
    let removed = db.inner().cart().clear(&identity.user_id).await?;
    debug!(user_id = %identity.user_id, removed, "Cart cleared");
    Ok(removed)
}
