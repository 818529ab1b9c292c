pub mod app_config;
pub mod config;
pub mod issuer;
pub mod observe;
pub mod permit;
pub mod status;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use issuer::Issuer;
pub use observe::{IngestObserver, TracingObserver};
pub use permit::{CanonicalPermitRecord, PermitFields, PermitInsert, ADDRESS_FALLBACK};
pub use status::{RefreshStatus, RunStatus};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),
    #[error("invalid run status: {0}")]
    InvalidRunStatus(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
