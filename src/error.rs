//! Error types for the income harvester

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the income harvester
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid schedule: {0}")]
    Schedule(String),

    // Chain errors
    #[error("Balance query failed: {0}")]
    Query(String),

    #[error("Transaction build failed: {0}")]
    TransactionBuild(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    // Ledger errors
    #[error("Persistence failed: {0}")]
    Persistence(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Short name of the pipeline stage this error belongs to, used in logs
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::UnknownNetwork(_) | Error::Schedule(_) => "config",
            Error::Query(_) => "query",
            Error::TransactionBuild(_) => "build",
            Error::Broadcast(_) => "broadcast",
            Error::Persistence(_) => "persist",
            Error::Serialization(_) | Error::Io(_) | Error::Anyhow(_) => "internal",
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Query(e.to_string())
    }
}

// Conversion from rusqlite errors
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Error::Query("x".into()).stage(), "query");
        assert_eq!(Error::TransactionBuild("x".into()).stage(), "build");
        assert_eq!(Error::Broadcast("x".into()).stage(), "broadcast");
        assert_eq!(Error::Persistence("x".into()).stage(), "persist");
    }

    #[test]
    fn test_config_errors_share_stage() {
        assert_eq!(Error::UnknownNetwork("juno-1".into()).stage(), "config");
        assert_eq!(Error::Schedule("bad".into()).stage(), "config");
        assert_eq!(Error::from(anyhow::anyhow!("boom")).stage(), "internal");
    }
}
