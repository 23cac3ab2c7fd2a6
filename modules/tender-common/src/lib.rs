pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::Config;
pub use error::{CrawlError, CrawlResult, StorageError};
pub use file_config::{
    load_keyword_file, parse_keyword_file, DictionaryEntryConfig, KeywordDefaults, KeywordFile,
};
pub use types::*;
