pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ipc;
pub mod model;
pub mod store;

pub use config::Config;
pub use error::{ConfigError, StoreError, StoreResult};
pub use store::Store;
