pub mod config;
pub mod error;
pub mod pool;
#[cfg(test)]
mod test;
pub mod utils;

pub use config::StoreConnectionConfig;
pub use error::DbConnectionError;
pub use pool::{create_pool, DbPool};
