pub mod app_config;
pub mod config;
pub mod criteria;
pub mod profiles;
pub mod records;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use criteria::FilterCriteria;
pub use profiles::{
    load_profiles, ConsentSpec, ExtractRule, FieldSelector, FieldSelectorConfig, PageProfile,
    PageReadinessSpec, Profiles, RankSelector,
};
pub use records::{CategoryRecord, ProductRecord, Record};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read profiles file {path}: {source}")]
    ProfilesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles file: {0}")]
    ProfilesFileParse(#[from] serde_yaml::Error),

    #[error("profiles validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),
}
