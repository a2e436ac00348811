pub mod approvals;
pub mod cache;
pub mod config;
pub mod error;
pub mod game_versions;
pub mod models;
pub mod mods;
pub mod motd;
pub mod store;
pub mod users;
pub mod versions;

pub use error::{ApiError, Result};
pub use store::Database;
