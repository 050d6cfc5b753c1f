pub mod codec;
pub mod config;
pub mod downstream;
pub mod error;
pub mod language;
pub mod storage;
pub mod types;

pub use codec::{ContentCodec, ZlibCodec};
pub use config::CaptureConfig;
pub use downstream::DownstreamSink;
pub use error::{Error, Result};
pub use language::{LanguageDetector, MarkupLanguageDetector};
pub use storage::ArticleStore;
pub use types::{Article, ArticleStatus, ForwardRecord, Language};
