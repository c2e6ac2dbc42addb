use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Recover the crate error category from an `anyhow` chain, if there is one
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&Error> {
        err.downcast_ref::<Error>()
    }

    /// True when the error means the requested row does not exist
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(Self::from_anyhow(err), Some(Error::NotFound(_)))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasts_through_anyhow() {
        let err: anyhow::Error = Error::NotFound("camera 7".to_string()).into();
        assert!(Error::is_not_found(&err));
        assert_eq!(
            Error::from_anyhow(&err),
            Some(&Error::NotFound("camera 7".to_string()))
        );

        let other = anyhow::anyhow!("plain failure");
        assert!(!Error::is_not_found(&other));
        assert!(Error::from_anyhow(&other).is_none());
    }
}
