pub mod config;
pub mod error;
pub mod framing;
pub mod memo;
pub mod protocol;
pub mod server;

pub use config::{ServerConfig, Transport};
pub use error::ServerError;
pub use memo::CacheStats;
pub use server::RiskServer;
