//! Settlement engine tests against real SQLite databases.
//!
//! Store failures are simulated with triggers that abort an insert, so the
//! engine sees the same error a failing disk or constraint would give it.

use std::time::Duration;

use arcade_core::{
    CoreError, DiscountCode, DiscountKind, DiscountRejection, DiscountUsageMode, Game,
    OwnedPurchasePolicy, Role, User, MAX_ITEM_QUANTITY,
};
use arcade_db::{
    Database, DbConfig, DiscountUsageStatus, NewDiscountCode, NewGame, NewUser, SettlementEngine,
    SettlementError, SettlementOptions,
};
use chrono::Utc;

// =============================================================================
// Fixtures
// =============================================================================

async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn user(db: &Database, username: &str, balance_cents: i64) -> User {
    db.users()
        .create(NewUser {
            username: username.to_string(),
            email: format!("{username}@test.local"),
            password_hash: "hash".to_string(),
            role: Role::User,
            balance_cents,
            display_name: None,
        })
        .await
        .unwrap()
}

async fn game(db: &Database, name: &str, price_cents: i64) -> Game {
    db.games()
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

async fn code(
    db: &Database,
    code: &str,
    kind: DiscountKind,
    value: i64,
    max_discount_cents: Option<i64>,
    usage_limit: i64,
) -> DiscountCode {
    db.discounts()
        .create(NewDiscountCode {
            code: code.to_string(),
            kind,
            value,
            min_spend_cents: 0,
            max_discount_cents,
            expires_at: Utc::now() + chrono::Duration::days(7),
            usage_limit,
        })
        .await
        .unwrap()
}

async fn add_to_cart(db: &Database, user: &User, game: &Game, quantity: i64) {
    db.cart()
        .add_item(&user.id, &game.id, quantity, MAX_ITEM_QUANTITY)
        .await
        .unwrap()
        .unwrap();
}

async fn reload_code(db: &Database, code: &DiscountCode) -> DiscountCode {
    db.discounts().get_by_id(&code.id, Utc::now()).await.unwrap().unwrap()
}

async fn fail_inserts_into(db: &Database, table: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER fail_{table} BEFORE INSERT ON {table} \
         BEGIN SELECT RAISE(ABORT, 'simulated failure'); END"
    ))
    .execute(db.pool())
    .await
    .unwrap();
}

fn engine(db: &Database) -> SettlementEngine {
    SettlementEngine::new(db.clone(), SettlementOptions::default())
}

fn engine_with_mode(db: &Database, mode: DiscountUsageMode) -> SettlementEngine {
    SettlementEngine::new(
        db.clone(),
        SettlementOptions {
            discount_usage_mode: mode,
            ..Default::default()
        },
    )
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_settles_cart() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine(&db).checkout(&buyer.id, None).await.unwrap();

    assert_eq!(receipt.total.cents(), 6_000);
    assert_eq!(receipt.balance_after.cents(), 4_000);
    assert_eq!(receipt.discount_usage, DiscountUsageStatus::NotApplicable);
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].price_cents, 6_000);
    assert_eq!(receipt.orders[0].discount_code, None);

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 4_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
    assert!(db.library().owns(&buyer.id, &a.id).await.unwrap());
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 0);
    assert_eq!(db.orders().list_for_user(&buyer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_quantity_counts_toward_total_sold() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 1_000).await;
    add_to_cart(&db, &buyer, &a, 3).await;

    let receipt = engine(&db).checkout(&buyer.id, None).await.unwrap();

    assert_eq!(receipt.total.cents(), 3_000);
    assert_eq!(receipt.orders[0].quantity, 3);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 3);
    assert_eq!(db.library().count_for_game(&a.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;

    let err = engine(&db).checkout(&buyer.id, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::EmptyCart)));
}

#[tokio::test]
async fn test_checkout_unknown_user() {
    let db = memory_db().await;

    let err = engine(&db).checkout("nobody", None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::UserNotFound(_))));
}

#[tokio::test]
async fn test_checkout_insufficient_funds_writes_nothing() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 5_000).await;
    let a = game(&db, "Game A", 6_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let err = engine(&db).checkout(&buyer.id, None).await.unwrap_err();
    match err {
        SettlementError::Core(CoreError::InsufficientFunds { balance, required }) => {
            assert_eq!(balance.cents(), 5_000);
            assert_eq!(required.cents(), 6_000);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 5_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 0);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 1);
    assert!(db.orders().list_for_user(&buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_inactive_game() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 1_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;
    db.games().soft_delete(&a.id).await.unwrap();

    let err = engine(&db).checkout(&buyer.id, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::GameInactive(id)) if id == a.id));
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 10_000);
}

#[tokio::test]
async fn test_checkout_excludes_owned_lines() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let b = game(&db, "Game B", 3_000).await;

    engine(&db).purchase(&buyer.id, &a.id).await.unwrap();
    add_to_cart(&db, &buyer, &a, 1).await;
    add_to_cart(&db, &buyer, &b, 1).await;

    let receipt = engine(&db).checkout(&buyer.id, None).await.unwrap();

    assert_eq!(receipt.excluded_owned, vec![a.id.clone()]);
    assert_eq!(receipt.total.cents(), 3_000);
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].game_id, b.id);
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 5_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_owned_line_for_delisted_game_is_dropped() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let b = game(&db, "Game B", 3_000).await;

    add_to_cart(&db, &buyer, &a, 1).await;
    add_to_cart(&db, &buyer, &b, 1).await;
    engine(&db).purchase(&buyer.id, &a.id).await.unwrap();
    db.games().soft_delete(&a.id).await.unwrap();

    let quote = engine(&db).preview(&buyer.id, None).await.unwrap();
    assert_eq!(quote.excluded_owned, vec![a.id.clone()]);
    assert_eq!(quote.total.cents(), 3_000);

    let receipt = engine(&db).checkout(&buyer.id, None).await.unwrap();
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(receipt.orders[0].game_id, b.id);
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 5_000);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_checkout_of_only_owned_games_fails_without_mutation() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;

    engine(&db).purchase(&buyer.id, &a.id).await.unwrap();
    add_to_cart(&db, &buyer, &a, 1).await;

    let err = engine(&db).checkout(&buyer.id, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::EmptyCart)));

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 8_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
    assert_eq!(db.orders().list_for_user(&buyer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rolls_back_on_store_failure() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let b = game(&db, "Game B", 3_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;
    add_to_cart(&db, &buyer, &b, 1).await;
    fail_inserts_into(&db, "library_entries").await;

    let err = engine(&db).checkout(&buyer.id, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::CommitFailed { .. }));
    assert!(err.is_retryable());

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 10_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 0);
    assert!(db.orders().list_for_user(&buyer.id).await.unwrap().is_empty());
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 2);
}

// =============================================================================
// Preview
// =============================================================================

#[tokio::test]
async fn test_preview_reports_rejection_without_failing() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let quote = engine(&db).preview(&buyer.id, Some("missing")).await.unwrap();
    assert_eq!(quote.rejection, Some(DiscountRejection::NotFound));
    assert_eq!(quote.total.cents(), 6_000);

    let err = engine(&db).checkout(&buyer.id, Some("missing")).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::Core(CoreError::DiscountInvalid {
            reason: DiscountRejection::NotFound
        })
    ));
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 10_000);
}

#[tokio::test]
async fn test_preview_writes_nothing() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let quote = engine(&db).preview(&buyer.id, Some("fixed10")).await.unwrap();
    assert_eq!(quote.discount.cents(), 1_000);
    assert_eq!(quote.total.cents(), 5_000);

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 0);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 1);
}

// =============================================================================
// Discounts
// =============================================================================

#[tokio::test]
async fn test_single_use_fixed_code() {
    let db = memory_db().await;
    let first = user(&db, "first", 10_000).await;
    let second = user(&db, "second", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &first, &a, 1).await;
    add_to_cart(&db, &second, &a, 1).await;

    let receipt = engine(&db).checkout(&first.id, Some("fixed10")).await.unwrap();
    assert_eq!(receipt.discount.cents(), 1_000);
    assert_eq!(receipt.total.cents(), 5_000);
    assert_eq!(receipt.discount_code.as_deref(), Some("FIXED10"));
    assert_eq!(receipt.discount_usage, DiscountUsageStatus::Recorded);
    assert_eq!(receipt.orders[0].discount_code.as_deref(), Some("FIXED10"));

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 1);
    assert!(!after.is_active);
    assert_eq!(after.used_by, vec![first.id.clone()]);

    let err = engine(&db).checkout(&second.id, Some("FIXED10")).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::Core(CoreError::DiscountInvalid {
            reason: DiscountRejection::UsedUp
        })
    ));
    assert_eq!(db.users().get_balance(&second.id).await.unwrap().cents(), 10_000);
}

#[tokio::test]
async fn test_receipt_wire_format() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine(&db).checkout(&buyer.id, Some("FIXED10")).await.unwrap();
    let json = serde_json::to_value(&receipt).unwrap();

    assert_eq!(json["userId"], buyer.id.as_str());
    assert_eq!(json["total"], 5_000);
    assert_eq!(json["balanceAfter"], 5_000);
    assert_eq!(json["discountCode"], "FIXED10");
    assert_eq!(json["discountUsage"], serde_json::json!({ "status": "recorded" }));
    assert_eq!(json["orders"][0]["status"], "completed");
}

#[tokio::test]
async fn test_percent_code_is_capped() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 50_000).await;
    let a = game(&db, "Game A", 20_000).await;
    code(&db, "SAVE10CAP5", DiscountKind::Percent, 10, Some(500), 100).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine(&db).checkout(&buyer.id, Some("save10cap5")).await.unwrap();

    assert_eq!(receipt.subtotal.cents(), 20_000);
    assert_eq!(receipt.discount.cents(), 500);
    assert_eq!(receipt.total.cents(), 19_500);
    assert_eq!(receipt.orders[0].price_cents, 20_000);
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 30_500);
}

#[tokio::test]
async fn test_code_cannot_be_reused_by_same_user() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 50_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let b = game(&db, "Game B", 2_000).await;
    code(&db, "SAVE10CAP5", DiscountKind::Percent, 10, Some(500), 100).await;

    add_to_cart(&db, &buyer, &a, 1).await;
    engine(&db).checkout(&buyer.id, Some("SAVE10CAP5")).await.unwrap();

    add_to_cart(&db, &buyer, &b, 1).await;
    let err = engine(&db).checkout(&buyer.id, Some("SAVE10CAP5")).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::Core(CoreError::DiscountInvalid {
            reason: DiscountRejection::AlreadyUsedByUser
        })
    ));
}

#[tokio::test]
async fn test_fixed_code_larger_than_subtotal_floors_total() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 1_000).await;
    let a = game(&db, "Game A", 500).await;
    code(&db, "BIGFIXED", DiscountKind::Fixed, 2_000, None, 5).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine(&db).checkout(&buyer.id, Some("bigfixed")).await.unwrap();

    assert_eq!(receipt.total.cents(), 0);
    assert_eq!(receipt.balance_after.cents(), 1_000);
    assert!(db.library().owns(&buyer.id, &a.id).await.unwrap());
}

#[tokio::test]
async fn test_after_commit_usage_failure_is_compensated() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;
    fail_inserts_into(&db, "discount_redemptions").await;

    let receipt = engine_with_mode(&db, DiscountUsageMode::AfterCommit)
        .checkout(&buyer.id, Some("FIXED10"))
        .await
        .unwrap();

    assert!(matches!(receipt.discount_usage, DiscountUsageStatus::Failed { .. }));

    // The settlement stands.
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 5_000);
    assert!(db.library().owns(&buyer.id, &a.id).await.unwrap());
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);

    // The bookkeeping was unwound.
    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 0);
    assert!(after.is_active);
    assert!(after.used_by.is_empty());
}

#[tokio::test]
async fn test_reserve_first_compensates_when_unit_fails() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;
    fail_inserts_into(&db, "orders").await;

    let err = engine_with_mode(&db, DiscountUsageMode::ReserveFirst)
        .checkout(&buyer.id, Some("FIXED10"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::CommitFailed { .. }));

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 0);
    assert!(after.is_active);
    assert!(after.used_by.is_empty());

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 10_000);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 1);
    assert!(!db.library().owns(&buyer.id, &a.id).await.unwrap());
}

#[tokio::test]
async fn test_reserve_first_records_usage() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine_with_mode(&db, DiscountUsageMode::ReserveFirst)
        .checkout(&buyer.id, Some("FIXED10"))
        .await
        .unwrap();
    assert_eq!(receipt.discount_usage, DiscountUsageStatus::Recorded);

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 1);
    assert!(!after.is_active);
    assert_eq!(after.used_by, vec![buyer.id.clone()]);
}

#[tokio::test]
async fn test_in_transaction_usage_commits_with_settlement() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    let receipt = engine_with_mode(&db, DiscountUsageMode::InTransaction)
        .checkout(&buyer.id, Some("FIXED10"))
        .await
        .unwrap();
    assert_eq!(receipt.discount_usage, DiscountUsageStatus::Recorded);

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 1);
    assert!(!after.is_active);
    assert_eq!(after.used_by, vec![buyer.id.clone()]);
}

#[tokio::test]
async fn test_in_transaction_usage_rolls_back_with_settlement() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;
    add_to_cart(&db, &buyer, &a, 1).await;
    fail_inserts_into(&db, "orders").await;

    let err = engine_with_mode(&db, DiscountUsageMode::InTransaction)
        .checkout(&buyer.id, Some("FIXED10"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::CommitFailed { .. }));

    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 0);
    assert!(after.is_active);
    assert!(after.used_by.is_empty());
    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 10_000);
}

// =============================================================================
// Direct purchase
// =============================================================================

#[tokio::test]
async fn test_purchase_leaves_cart_alone() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let b = game(&db, "Game B", 3_000).await;
    add_to_cart(&db, &buyer, &b, 1).await;

    let receipt = engine(&db).purchase(&buyer.id, &a.id).await.unwrap();

    assert_eq!(receipt.total.cents(), 2_000);
    assert_eq!(receipt.discount_usage, DiscountUsageStatus::NotApplicable);
    assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 1);
    assert!(db.library().owns(&buyer.id, &a.id).await.unwrap());
}

#[tokio::test]
async fn test_purchase_unknown_or_inactive_game() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    db.games().soft_delete(&a.id).await.unwrap();

    let err = engine(&db).purchase(&buyer.id, "missing").await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::GameNotFound(_))));

    let err = engine(&db).purchase(&buyer.id, &a.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::GameInactive(_))));
}

#[tokio::test]
async fn test_repurchase_allowed_by_default() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let engine = engine(&db);
    assert_eq!(engine.options().owned_purchase_policy, OwnedPurchasePolicy::AllowRepurchase);

    engine.purchase(&buyer.id, &a.id).await.unwrap();
    engine.purchase(&buyer.id, &a.id).await.unwrap();

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 6_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 2);
    assert_eq!(db.orders().count_for_user_game(&buyer.id, &a.id).await.unwrap(), 2);
    assert_eq!(db.library().count_for_game(&a.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_repurchase_rejected_by_policy() {
    let db = memory_db().await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 2_000).await;
    let engine = SettlementEngine::new(
        db.clone(),
        SettlementOptions {
            owned_purchase_policy: OwnedPurchasePolicy::Reject,
            ..Default::default()
        },
    );

    engine.purchase(&buyer.id, &a.id).await.unwrap();
    let err = engine.purchase(&buyer.id, &a.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Core(CoreError::AlreadyOwned(id)) if id == a.id));

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 8_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
}

// =============================================================================
// Concurrency (file-backed WAL database)
// =============================================================================

async fn file_db(dir: &tempfile::TempDir) -> Database {
    Database::new(DbConfig::new(dir.path().join("arcade.db")).max_connections(8))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_of_same_game() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;
    let a = game(&db, "Game A", 1_000).await;

    let mut buyers = Vec::new();
    for i in 0..10 {
        let buyer = user(&db, &format!("buyer{i}"), 5_000).await;
        add_to_cart(&db, &buyer, &a, 1).await;
        buyers.push(buyer);
    }

    let engine = engine(&db);
    let handles: Vec<_> = buyers
        .iter()
        .map(|buyer| {
            let engine = engine.clone();
            let user_id = buyer.id.clone();
            tokio::spawn(async move { engine.checkout(&user_id, None).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 10);
    assert_eq!(db.orders().quantity_sold(&a.id).await.unwrap(), 10);
    assert_eq!(db.library().count_for_game(&a.id).await.unwrap(), 10);
    for buyer in &buyers {
        assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 4_000);
        assert_eq!(db.cart().count_items(&buyer.id).await.unwrap(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;
    let buyer = user(&db, "buyer", 1_500).await;
    let a = game(&db, "Game A", 1_000).await;
    let b = game(&db, "Game B", 1_000).await;

    let engine = engine(&db);
    let first = {
        let engine = engine.clone();
        let (user_id, game_id) = (buyer.id.clone(), a.id.clone());
        tokio::spawn(async move { engine.purchase(&user_id, &game_id).await })
    };
    let second = {
        let engine = engine.clone();
        let (user_id, game_id) = (buyer.id.clone(), b.id.clone());
        tokio::spawn(async move { engine.purchase(&user_id, &game_id).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(SettlementError::Core(CoreError::InsufficientFunds { .. }))
    )));

    assert_eq!(db.users().get_balance(&buyer.id).await.unwrap().cents(), 500);
    let sold = db.games().total_sold(&a.id).await.unwrap() + db.games().total_sold(&b.id).await.unwrap();
    assert_eq!(sold, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_transaction_claims_never_exceed_limit() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;
    let a = game(&db, "Game A", 6_000).await;
    let fixed = code(&db, "FIXED10", DiscountKind::Fixed, 1_000, None, 1).await;

    let mut buyers = Vec::new();
    for i in 0..4 {
        let buyer = user(&db, &format!("buyer{i}"), 10_000).await;
        add_to_cart(&db, &buyer, &a, 1).await;
        buyers.push(buyer);
    }

    let engine = engine_with_mode(&db, DiscountUsageMode::InTransaction);
    let handles: Vec<_> = buyers
        .iter()
        .map(|buyer| {
            let engine = engine.clone();
            let user_id = buyer.id.clone();
            tokio::spawn(async move { engine.checkout(&user_id, Some("FIXED10")).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(
                matches!(
                    err,
                    SettlementError::Core(CoreError::DiscountInvalid {
                        reason: DiscountRejection::UsedUp
                    })
                ),
                "unexpected error: {err:?}"
            ),
        }
    }

    assert_eq!(succeeded, 1);
    let after = reload_code(&db, &fixed).await;
    assert_eq!(after.used_count, 1);
    assert_eq!(after.used_by.len(), 1);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_database_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;
    let buyer = user(&db, "buyer", 10_000).await;
    let a = game(&db, "Game A", 1_000).await;
    add_to_cart(&db, &buyer, &a, 1).await;

    // A second handle on the same file that gives up on the lock quickly.
    let impatient = Database::new(
        DbConfig::new(dir.path().join("arcade.db"))
            .busy_timeout(Duration::from_millis(20))
            .run_migrations(false),
    )
    .await
    .unwrap();
    let engine = SettlementEngine::new(
        impatient,
        SettlementOptions {
            max_commit_retries: 50,
            initial_retry_backoff: Duration::from_millis(10),
            max_retry_backoff: Duration::from_millis(50),
            ..Default::default()
        },
    );

    // Hold the write lock for a while.
    let mut blocker = db.pool().begin().await.unwrap();
    sqlx::query("UPDATE games SET updated_at = updated_at")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let user_id = buyer.id.clone();
    let checkout = tokio::spawn(async move { engine.checkout(&user_id, None).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    blocker.commit().await.unwrap();

    let receipt = checkout.await.unwrap().unwrap();
    assert_eq!(receipt.balance_after.cents(), 9_000);
    assert_eq!(db.games().total_sold(&a.id).await.unwrap(), 1);
}
