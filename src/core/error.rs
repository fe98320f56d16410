use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tuning error: {0}")]
    Tuning(String),

    #[error("Bond file error in '{file}': {message}")]
    BondFile { file: String, message: String },

    #[error("Bond range error: {0}")]
    Range(String),

    #[error("State catalog error: {0}")]
    StateCatalog(String),

    #[error("End state catalog error: {0}")]
    EndStateCatalog(String),

    #[error("Applied state error: {0}")]
    AppliedState(String),

    #[error("Character error: {0}")]
    Character(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
