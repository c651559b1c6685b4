//! # Catalog Commands
//!
//! Game listing for everyone, catalog management for admins.
//!
//! ## Caching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list_games(filter) ──► "games:" + filter.cache_key()  (catalog TTL)   │
//! │  get_game(id)       ──► "games:id:" + id               (catalog TTL)   │
//! │  list_categories()  ──► "categories"                   (catalog TTL)   │
//! │                                                                         │
//! │  create_game / update_game / delete_game ──► invalidate "games:"       │
//! │  create_category                         ──► invalidate "categories"   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sold counters move with every settlement and are not invalidated; a
//! best-selling listing can lag by up to one TTL.

use arcade_core::validation::{validate_game_name, validate_price_cents, validate_search_query};
use arcade_core::{Category, CoreError, Game, GameFilter, Identity};
use arcade_db::{GameUpdate, NewGame};
use serde::Deserialize;
use tracing::{debug, info};

use super::require_admin;
use crate::error::ApiError;
use crate::state::{keys, CacheState, DbState};

/// New game fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: Option<String>,
    /// URL returned by the external image store.
    pub image_url: Option<String>,
}

/// Partial game update. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateGameRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
}

/// Lists games matching `filter`, read through the cache.
///
/// Only admins may list soft-deleted games.
pub async fn list_games(
    db: &DbState,
    cache: &CacheState,
    identity: Option<&Identity>,
    mut filter: GameFilter,
) -> Result<Vec<Game>, ApiError> {
    debug!(?filter, "list_games command");

    if filter.include_inactive {
        match identity {
            Some(identity) => require_admin(identity, "list inactive games")?,
            None => return Err(ApiError::forbidden("list inactive games")),
        }
    }
    filter.search = match filter.search.as_deref() {
        Some(q) => Some(validate_search_query(q).map_err(CoreError::from)?).filter(|q| !q.is_empty()),
        None => None,
    };

    let key = format!("{}{}", keys::GAMES, filter.cache_key());
    cache
        .inner()
        .get_or_try_insert_with(&key, cache.catalog_ttl, || async move {
            Ok::<Vec<Game>, ApiError>(db.inner().games().list(&filter).await?)
        })
        .await
}

/// One game by id. Soft-deleted games are visible here so order history
/// can still show what was bought.
pub async fn get_game(db: &DbState, cache: &CacheState, game_id: &str) -> Result<Game, ApiError> {
    debug!(game_id = %game_id, "get_game command");

    let key = format!("{}id:{}", keys::GAMES, game_id);
    cache
        .inner()
        .get_or_try_insert_with(&key, cache.catalog_ttl, || async move {
            let game = db
                .inner()
                .games()
                .get_by_id(game_id)
                .await?
                .ok_or_else(|| CoreError::GameNotFound(game_id.to_string()))?;
            Ok::<Game, ApiError>(game)
        })
        .await
}

pub async fn list_categories(db: &DbState, cache: &CacheState) -> Result<Vec<Category>, ApiError> {
    cache
        .inner()
        .get_or_try_insert_with(keys::CATEGORIES, cache.catalog_ttl, || async move {
            Ok::<Vec<Category>, ApiError>(db.inner().games().list_categories().await?)
        })
        .await
}

/// Admin: adds a game to the catalog.
pub async fn create_game(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    request: CreateGameRequest,
) -> Result<Game, ApiError> {
    require_admin(identity, "create games")?;
    validate_game_name(&request.name).map_err(CoreError::from)?;
    validate_price_cents(request.price_cents).map_err(CoreError::from)?;

    let game = db
        .inner()
        .games()
        .create(NewGame {
            name: request.name.trim().to_string(),
            description: request.description,
            price_cents: request.price_cents,
            category_id: request.category_id,
            image_url: request.image_url,
        })
        .await?;

    cache.invalidate_catalog();
    info!(game_id = %game.id, name = %game.name, price = %game.price(), "Game created");
    Ok(game)
}

/// Admin: updates price or details.
pub async fn update_game(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    game_id: &str,
    request: UpdateGameRequest,
) -> Result<Game, ApiError> {
    require_admin(identity, "update games")?;
    if let Some(name) = &request.name {
        validate_game_name(name).map_err(CoreError::from)?;
    }
    if let Some(price) = request.price_cents {
        validate_price_cents(price).map_err(CoreError::from)?;
    }

    let game = db
        .inner()
        .games()
        .update(
            game_id,
            GameUpdate {
                name: request.name.map(|n| n.trim().to_string()),
                description: request.description,
                price_cents: request.price_cents,
                category_id: request.category_id,
                image_url: request.image_url,
            },
        )
        .await?;

    cache.invalidate_catalog();
    info!(game_id = %game.id, price = %game.price(), "Game updated");
    Ok(game)
}

/// Admin: soft-deletes a game. Owners keep it in their library.
pub async fn delete_game(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    game_id: &str,
) -> Result<(), ApiError> {
    require_admin(identity, "delete games")?;

    db.inner().games().soft_delete(game_id).await?;

    cache.invalidate_catalog();
    info!(game_id = %game_id, "Game deactivated");
    Ok(())
}

/// Admin: adds a category.
pub async fn create_category(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    name: &str,
    description: Option<&str>,
) -> Result<Category, ApiError> {
    require_admin(identity, "create categories")?;
    if name.trim().is_empty() {
        return Err(ApiError::validation("category name is required"));
    }

    let category = db.inner().games().create_category(name.trim(), description).await?;

    cache.inner().invalidate(keys::CATEGORIES);
    info!(category_id = %category.id, name = %category.name, "Category created");
    Ok(category)
}
