//! Schema migrations for the job store, embedded at compile time.

use sqlx::migrate::Migrator;

pub static SQLITE_MIGRATOR: Migrator = sqlx::migrate!("src/migrations_sqlite");

pub fn sqlite_migrator() -> &'static Migrator {
    &SQLITE_MIGRATOR
}
