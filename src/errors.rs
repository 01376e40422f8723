use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Inventory section was never collected: {0}")]
    MissingInventory(&'static str),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReporterError>;
