use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Language used when an adapter's own language has no default list.
pub const FALLBACK_LANGUAGE: &str = "en";

/// TOML-backed keyword configuration: per-language default keywords plus
/// dictionary entries that extend the built-in expansion taxonomy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordFile {
    #[serde(default)]
    pub defaults: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub dictionary: Vec<DictionaryEntryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryEntryConfig {
    pub term: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub related_terms: Vec<String>,
    #[serde(default)]
    pub translations: Vec<String>,
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

/// Load and parse a keyword TOML file.
pub fn load_keyword_file(path: &Path) -> Result<KeywordFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keyword file: {}", path.display()))?;
    parse_keyword_file(&content)
        .with_context(|| format!("Failed to parse keyword file: {}", path.display()))
}

pub fn parse_keyword_file(content: &str) -> Result<KeywordFile> {
    Ok(toml::from_str(content)?)
}

/// Per-language default keyword lists used when a run gives no keywords.
#[derive(Debug, Clone)]
pub struct KeywordDefaults {
    by_language: BTreeMap<String, Vec<String>>,
}

impl KeywordDefaults {
    /// Built-in lists for molecular and in-vitro diagnostics tenders.
    pub fn builtin() -> Self {
        let lists: [(&str, &[&str]); 3] = [
            (
                "ko",
                &[
                    "진단키트", "PCR", "분자진단", "RT-PCR", "코로나", "COVID",
                    "인플루엔자", "독감", "호흡기감염", "병원체검사", "체외진단",
                ],
            ),
            (
                "en",
                &[
                    "diagnostic kit", "PCR test", "molecular diagnostic", "RT-PCR",
                    "COVID test", "coronavirus", "influenza test", "respiratory pathogen",
                    "in vitro diagnostic", "IVD", "point of care",
                ],
            ),
            (
                "fr",
                &[
                    "diagnostic", "kit de diagnostic", "test PCR", "diagnostic moléculaire",
                    "diagnostic in vitro", "réactifs", "dépistage",
                ],
            ),
        ];

        let by_language = lists
            .into_iter()
            .map(|(lang, words)| {
                (
                    lang.to_string(),
                    words.iter().map(|w| w.to_string()).collect(),
                )
            })
            .collect();
        Self { by_language }
    }

    /// Built-in lists overridden per language by the file's `[defaults]`.
    pub fn from_file(file: &KeywordFile) -> Self {
        let mut defaults = Self::builtin();
        for (lang, words) in &file.defaults {
            let words: Vec<String> = words
                .iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect();
            if !words.is_empty() {
                defaults.by_language.insert(lang.to_lowercase(), words);
            }
        }
        defaults
    }

    /// Default keywords for a language, falling back to English.
    pub fn for_language(&self, language: &str) -> Vec<String> {
        self.by_language
            .get(&language.to_lowercase())
            .or_else(|| self.by_language.get(FALLBACK_LANGUAGE))
            .cloned()
            .unwrap_or_default()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.by_language.keys().map(String::as_str)
    }
}

impl Default for KeywordDefaults {
    fn default() -> Self {
        Self::builtin()
    }
}
