//! # CashGrid Repository
//!
//! Concrete repository implementation (adapter) for the payment
//! authorization core. This crate provides the SQLite adapter that
//! implements the `PaymentRepository` port.

pub mod sqlite;

mod types;


pub use sqlite::SqliteRepo;

/// Build and initialize a repository from a database URL.
///
/// This function:
/// 1. Connects to the database (creating the file if missing)
/// 2. Runs migrations to create tables
/// 3. Returns a ready-to-use [`SqliteRepo`]
///
/// # Examples
///
/// ```ignore
/// let repo = build_repo("sqlite://cashgrid.db?mode=rwc").await?;
/// ```
pub async fn build_repo(database_url: &str) -> anyhow::Result<SqliteRepo> {
    SqliteRepo::new(database_url).await
}
