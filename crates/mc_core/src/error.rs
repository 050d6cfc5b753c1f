use thiserror::Error;

use crate::types::ArticleStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Could not extract {field} from {url}")]
    FieldParse { url: String, field: String },

    #[error("Unrecognized date string {raw:?}: {reason}")]
    DateFormat { raw: String, reason: String },

    #[error("Downstream ingestion error: {0}")]
    Downstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("No article stored for {0}")]
    NotFound(String),

    #[error("Article already stored: {0}")]
    Duplicate(String),

    #[error("Refusing to move {link} from {from} to {to}")]
    StatusRegression {
        link: String,
        from: ArticleStatus,
        to: ArticleStatus,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Only losing the store aborts a whole run; everything else is
    /// confined to the URL or field that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn network(url: &str, reason: impl ToString) -> Self {
        Error::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn date_format(raw: &str, reason: impl ToString) -> Self {
        Error::DateFormat {
            raw: raw.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_is_fatal() {
        assert!(Error::Storage("connection reset".into()).is_fatal());
        assert!(!Error::network("http://a", "timeout").is_fatal());
        assert!(!Error::Duplicate("http://a".into()).is_fatal());
        assert!(!Error::Configuration("unknown category".into()).is_fatal());
        assert!(!Error::InvalidRecord("status archived".into()).is_fatal());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::FieldParse {
            url: "http://x/1".into(),
            field: "title".into(),
        };
        assert_eq!(err.to_string(), "Could not extract title from http://x/1");

        let err = Error::date_format("31 fooember 2013", "unknown month");
        assert!(err.to_string().contains("fooember"));
    }
}
