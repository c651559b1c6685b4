//! # Seed Data Generator
//!
//! Populates the database with a demo catalog, accounts and discount codes.
//!
//! ## Usage
//! ```bash
//! # Seed ./arcade_dev.db
//! cargo run -p arcade-db --bin seed
//!
//! # Specify database path
//! cargo run -p arcade-db --bin seed -- --db ./data/arcade.db
//! ```
//!
//! ## Generated Data
//! - Categories with a handful of games each, prices $4.99 - $59.99
//! - `admin` (admin role) and `player1`/`player2` with $100.00 wallets
//! - `FIXED10`: $10.00 off, single use
//! - `SAVE10CAP5`: 10% off, capped at $5.00
//!
//! Password hashes are placeholders; real accounts come from the auth
//! collaborator.

use std::env;

use arcade_core::{DiscountKind, Role};
use arcade_db::{Database, DbConfig, NewDiscountCode, NewGame, NewUser};
use chrono::{Duration, Utc};

/// (category, description, games as (name, price in cents))
const CATALOG: &[(&str, &str, &[(&str, i64)])] = &[
    (
        "Action",
        "Fast reflexes required",
        &[
            ("Neon Drift", 2999),
            ("Iron Vanguard", 5999),
            ("Skyline Runner", 1499),
            ("Rogue Circuit", 1999),
        ],
    ),
    (
        "Puzzle",
        "Think before you move",
        &[
            ("Tile Theory", 499),
            ("Lumen Locks", 999),
            ("Gearbox Garden", 1299),
        ],
    ),
    (
        "Strategy",
        "Plan ten turns ahead",
        &[
            ("Frontier Accord", 3999),
            ("Harbor Lords", 2499),
            ("Orbital Siege", 4999),
        ],
    ),
    (
        "Indie",
        "Small teams, big ideas",
        &[
            ("Paper Lanterns", 799),
            ("Moss & Stone", 1199),
            ("Night Bus", 699),
        ],
    ),
];

const DEMO_BALANCE_CENTS: i64 = 10_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./arcade_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Arcade Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./arcade_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Arcade Storefront Seed Data Generator");
    println!("=======================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.games().list_categories().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} categories", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    println!();
    println!("Generating catalog...");

    let mut games = 0;
    for (category_name, description, titles) in CATALOG {
        let category = db.games().create_category(category_name, Some(*description)).await?;

        for (name, price_cents) in titles.iter() {
            let new = NewGame {
                name: name.to_string(),
                description: Some(format!("{} ({})", name, category_name)),
                price_cents: *price_cents,
                category_id: Some(category.id.clone()),
                image_url: None,
            };
            if let Err(e) = db.games().create(new).await {
                eprintln!("Failed to insert {}: {}", name, e);
                continue;
            }
            games += 1;
        }
    }
    println!("✓ Generated {} games in {} categories", games, CATALOG.len());

    // Accounts
    println!();
    println!("Creating accounts...");

    let accounts = [
        ("admin", Role::Admin, 0),
        ("player1", Role::User, DEMO_BALANCE_CENTS),
        ("player2", Role::User, DEMO_BALANCE_CENTS),
    ];
    for (username, role, balance_cents) in accounts {
        let user = db
            .users()
            .create(NewUser {
                username: username.to_string(),
                email: format!("{}@arcade.local", username),
                password_hash: String::from("seed-placeholder"),
                role,
                balance_cents,
                display_name: None,
            })
            .await?;
        println!("  {} ({}) balance {}", user.username, role.as_str(), user.balance());
    }

    // Discount codes
    println!();
    println!("Creating discount codes...");

    let expires_at = Utc::now() + Duration::days(90);
    let codes = [
        NewDiscountCode {
            code: String::from("FIXED10"),
            kind: DiscountKind::Fixed,
            value: 1000,
            min_spend_cents: 0,
            max_discount_cents: None,
            expires_at,
            usage_limit: 1,
        },
        NewDiscountCode {
            code: String::from("SAVE10CAP5"),
            kind: DiscountKind::Percent,
            value: 10,
            min_spend_cents: 0,
            max_discount_cents: Some(500),
            expires_at,
            usage_limit: 100,
        },
    ];
    for new in codes {
        let code = db.discounts().create(new).await?;
        println!("  {} (limit {})", code.code, code.usage_limit);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
