//! # Database State
//!
//! Wraps the `Database` handle and the `SettlementEngine` built on it.
//!
//! ## Thread Safety
//! `Database` holds a `SqlitePool`, which is thread-safe; the engine only
//! holds a clone of it. Commands can run concurrently without extra
//! locking; the settlement transaction does its own serialisation.

use arcade_db::{Database, SettlementEngine, SettlementOptions};

/// Database handle plus the settlement engine.
#[derive(Debug, Clone)]
pub struct DbState {
    db: Database,
    engine: SettlementEngine,
}

impl DbState {
    pub fn new(db: Database, options: SettlementOptions) -> Self {
        let engine = SettlementEngine::new(db.clone(), options);
        DbState { db, engine }
    }

    /// Returns a reference to the inner Database.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let games = db_state.inner().games().list(&filter).await?;
    /// ```
    pub fn inner(&self) -> &Database {
        &self.db
    }

    pub fn settlement(&self) -> &SettlementEngine {
        &self.engine
    }
}
