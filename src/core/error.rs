use thiserror::Error;

use crate::core::types::FamilyId;

#[derive(Error, Debug)]
pub enum DfnError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{family} puts probability {mass:e} in the radius range [{min}, {max}]")]
    UnsatisfiableSize {
        family: FamilyId,
        min: f64,
        max: f64,
        mass: f64,
    },

    #[error("Unknown shape family: {0:?}")]
    UnknownFamily(FamilyId),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DfnError>;
