pub mod builder;
pub mod config;
pub mod error;
pub mod executor;
pub mod index;
pub mod partition;
pub mod retry;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
