//! # Discount Code Administration
//!
//! Admin-only management of the discount ledger. Redemption itself happens
//! inside settlement; nothing here touches `used_count`.

use arcade_core::validation::{validate_discount_code, validate_discount_terms};
use arcade_core::{CoreError, DiscountCode, DiscountKind, Identity};
use arcade_db::NewDiscountCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::require_admin;
use crate::error::ApiError;
use crate::state::DbState;

/// New code fields.
///
/// ```json
/// { "code": "SAVE10CAP5", "kind": "percent", "value": 10,
///   "maxDiscountCents": 500, "expiresAt": "2026-12-31T23:59:59Z", "usageLimit": 100 }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountRequest {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    #[serde(default)]
    pub min_spend_cents: i64,
    pub max_discount_cents: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: i64,
}

pub async fn create_discount_code(
    db: &DbState,
    identity: &Identity,
    request: CreateDiscountRequest,
) -> Result<DiscountCode, ApiError> {
    require_admin(identity, "create discount codes")?;

    let code = validate_discount_code(&request.code).map_err(CoreError::from)?;
    validate_discount_terms(
        request.kind,
        request.value,
        request.min_spend_cents,
        request.max_discount_cents,
        request.usage_limit,
    )
    .map_err(CoreError::from)?;
    if request.expires_at <= Utc::now() {
        return Err(ApiError::validation("expiry must be in the future"));
    }

    let created = db
        .inner()
        .discounts()
        .create(NewDiscountCode {
            code,
            kind: request.kind,
            value: request.value,
            min_spend_cents: request.min_spend_cents,
            max_discount_cents: request.max_discount_cents,
            expires_at: request.expires_at,
            usage_limit: request.usage_limit,
        })
        .await?;

    info!(
        id = %created.id,
        code = %created.code,
        kind = ?created.kind,
        value = created.value,
        usage_limit = created.usage_limit,
        "Discount code created"
    );
    Ok(created)
}

/// Every code, newest first. Expired codes are switched off on the way.
pub async fn list_discount_codes(db: &DbState, identity: &Identity) -> Result<Vec<DiscountCode>, ApiError> {
    require_admin(identity, "list discount codes")?;
    Ok(db.inner().discounts().list(Utc::now()).await?)
}

pub async fn deactivate_discount_code(db: &DbState, identity: &Identity, id: &str) -> Result<(), ApiError> {
    require_admin(identity, "deactivate discount codes")?;

    db.inner().discounts().deactivate(id).await?;
    info!(id = %id, "Discount code deactivated");
    Ok(())
}
