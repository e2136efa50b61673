//! Configuration for the stance core
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use uuid::Uuid;

use crate::types::{Result, StanceError};

/// Stance - declaration ledger and rating weight engine
#[derive(Parser, Debug, Clone)]
#[command(name = "stance")]
#[command(about = "Declaration ledger and rating weight engine for mod community targets")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "stance")]
    pub mongodb_db: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Run a full aggregate sweep over every mod before entering the
    /// reactive event loop (scheduled maintenance, not the hot path)
    #[arg(long, env = "SWEEP", default_value = "false")]
    pub sweep: bool,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    /// Validate configuration before startup
    pub fn validate(&self) -> Result<()> {
        if self.mongodb_uri.is_empty() {
            return Err(StanceError::Config("MONGODB_URI must not be empty".to_string()));
        }
        if self.mongodb_db.is_empty() {
            return Err(StanceError::Config("MONGODB_DB must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let args = Args::parse_from(["stance"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_empty_mongodb_uri_rejected() {
        let mut args = Args::parse_from(["stance"]);
        args.mongodb_uri.clear();

        let err = args.validate().unwrap_err();
        assert_eq!(err.code(), "config_error");
        assert_eq!(err.status_code(), 500);
    }
}
