pub mod cpv;
pub mod dictionary;
pub mod engine;

pub use cpv::CpvClassifier;
pub use dictionary::{KeywordDictionary, KeywordExpansionEntry, KeywordKind};
pub use engine::{
    ExpandedKeyword, ExpansionOptions, KeywordMatcher, RelevanceEngine, DEFAULT_MAX_EXPANSIONS,
};
