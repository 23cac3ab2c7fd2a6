use std::collections::{BTreeSet, HashSet};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tender_common::{KeywordFile, MAX_RELEVANCE_SCORE};
use typed_builder::TypedBuilder;

use crate::dictionary::{KeywordDictionary, KeywordKind};

/// Default cap on expansions generated per seed keyword.
pub const DEFAULT_MAX_EXPANSIONS: usize = 3;

/// Multiplier when a term matches on word boundaries.
const WHOLE_WORD_BONUS: f64 = 1.2;
/// Multiplier when a term matches inside the title field.
const TITLE_BONUS: f64 = 1.5;

/// A term produced by expansion, with its origin, fixed weight and relevance.
///
/// A match contributes `weight * relevance`. Both start at the origin's kind
/// weight, so a synonym match is worth 0.81 before bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedKeyword {
    pub term: String,
    pub origin: KeywordKind,
    pub weight: f64,
    pub relevance: f64,
}

impl ExpandedKeyword {
    pub fn new(term: impl Into<String>, origin: KeywordKind) -> Self {
        Self {
            term: term.into(),
            origin,
            weight: origin.weight(),
            relevance: origin.weight(),
        }
    }

    fn contribution(&self) -> f64 {
        self.weight * self.relevance
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ExpansionOptions {
    #[builder(default = true)]
    pub enable_synonyms: bool,
    #[builder(default = true)]
    pub enable_related_terms: bool,
    #[builder(default = true)]
    pub enable_translations: bool,
    #[builder(default = true)]
    pub enable_abbreviations: bool,
    /// Upper bound on terms added per seed keyword, across all kinds.
    #[builder(default = DEFAULT_MAX_EXPANSIONS)]
    pub max_expansions_per_keyword: usize,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExpansionOptions {
    /// Seeds only, no expansion.
    pub fn none() -> Self {
        Self::builder()
            .enable_synonyms(false)
            .enable_related_terms(false)
            .enable_translations(false)
            .enable_abbreviations(false)
            .build()
    }

    fn enabled(&self, kind: KeywordKind) -> bool {
        match kind {
            KeywordKind::Original => true,
            KeywordKind::Translation => self.enable_translations,
            KeywordKind::Synonym => self.enable_synonyms,
            KeywordKind::Abbreviation => self.enable_abbreviations,
            KeywordKind::Related => self.enable_related_terms,
        }
    }
}

/// Keyword expansion and heuristic relevance scoring.
///
/// Pure and I/O free: a lookup miss contributes nothing and no operation can
/// fail at runtime. Shared across adapters behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RelevanceEngine {
    dictionary: KeywordDictionary,
}

impl RelevanceEngine {
    pub fn new(dictionary: KeywordDictionary) -> Self {
        Self { dictionary }
    }

    /// Engine over the built-in diagnostics taxonomy.
    pub fn builtin() -> Self {
        Self::new(KeywordDictionary::builtin())
    }

    /// Built-in taxonomy extended with the entries of a keyword file.
    pub fn from_keyword_file(file: &KeywordFile) -> Self {
        Self::new(KeywordDictionary::builtin().with_entries(&file.dictionary))
    }

    pub fn dictionary(&self) -> &KeywordDictionary {
        &self.dictionary
    }

    /// Expand seed keywords.
    ///
    /// Every seed is emitted as `original` (weight 1.0). Enabled kinds are then
    /// tried strongest first (translation, synonym, abbreviation, related) until
    /// `max_expansions_per_keyword` new terms were added for that seed. Terms are
    /// de-duplicated case-insensitively across the whole result; the first
    /// occurrence wins.
    pub fn expand<S: AsRef<str>>(
        &self,
        seeds: &[S],
        options: &ExpansionOptions,
    ) -> Vec<ExpandedKeyword> {
        let mut seen = HashSet::new();
        let mut expanded = Vec::new();

        for seed in seeds {
            let seed = seed.as_ref().trim();
            if seed.is_empty() || !seen.insert(seed.to_lowercase()) {
                continue;
            }
            expanded.push(ExpandedKeyword::new(seed, KeywordKind::Original));

            let mut budget = options.max_expansions_per_keyword;
            for kind in KeywordKind::EXPANSIONS {
                if budget == 0 {
                    break;
                }
                if !options.enabled(kind) {
                    continue;
                }
                for term in self.dictionary.lookup(seed, kind) {
                    if budget == 0 {
                        break;
                    }
                    if seen.insert(term.to_lowercase()) {
                        expanded.push(ExpandedKeyword::new(term, kind));
                        budget -= 1;
                    }
                }
            }
        }

        expanded
    }

    /// Score free text against an expansion, in `[0, 10]`.
    pub fn score(&self, text: &str, expanded: &[ExpandedKeyword]) -> f64 {
        self.score_fields("", text, expanded)
    }

    /// Score a title and body. Matches inside the title get an extra bonus.
    ///
    /// Compiles the terms for this call only; build a `KeywordMatcher` once
    /// when scoring many records against the same expansion.
    pub fn score_fields(&self, title: &str, body: &str, expanded: &[ExpandedKeyword]) -> f64 {
        KeywordMatcher::new(expanded).score_fields(title, body)
    }

    /// Expanded terms that occur in the title or body.
    pub fn matched_terms(
        &self,
        title: &str,
        body: &str,
        expanded: &[ExpandedKeyword],
    ) -> BTreeSet<String> {
        KeywordMatcher::new(expanded).matched_terms(title, body)
    }

    /// Candidate terms for the seeds, strongest kind first, excluding the seeds.
    pub fn suggest<S: AsRef<str>>(&self, seeds: &[S], max_suggestions: usize) -> Vec<String> {
        let mut seen: HashSet<String> = seeds
            .iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .collect();

        let mut candidates: Vec<ExpandedKeyword> = Vec::new();
        for seed in seeds {
            for kind in KeywordKind::EXPANSIONS {
                for term in self.dictionary.lookup(seed.as_ref(), kind) {
                    if seen.insert(term.to_lowercase()) {
                        candidates.push(ExpandedKeyword::new(term, kind));
                    }
                }
            }
        }

        candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        candidates
            .into_iter()
            .take(max_suggestions)
            .map(|k| k.term)
            .collect()
    }
}

impl Default for RelevanceEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone)]
struct CompiledTerm {
    keyword: ExpandedKeyword,
    lowered: String,
    whole_word: Option<Regex>,
}

impl CompiledTerm {
    fn whole_word_in(&self, haystack: &str) -> bool {
        self.whole_word
            .as_ref()
            .is_some_and(|re| re.is_match(haystack))
    }
}

/// An expansion with each term lower-cased and its word-boundary pattern
/// compiled up front.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    terms: Vec<CompiledTerm>,
}

impl KeywordMatcher {
    pub fn new(expanded: &[ExpandedKeyword]) -> Self {
        let terms = expanded
            .iter()
            .filter_map(|keyword| {
                let lowered = keyword.term.trim().to_lowercase();
                if lowered.is_empty() {
                    return None;
                }
                let whole_word = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&lowered)))
                    .case_insensitive(true)
                    .build()
                    .ok();
                Some(CompiledTerm {
                    keyword: keyword.clone(),
                    lowered,
                    whole_word,
                })
            })
            .collect();
        Self { terms }
    }

    pub fn keywords(&self) -> impl Iterator<Item = &ExpandedKeyword> {
        self.terms.iter().map(|t| &t.keyword)
    }

    /// Each term found as a substring adds `weight * relevance`, times 1.2 on
    /// a whole-word match and times 1.5 when found in the title. Clamped to 10.
    pub fn score_fields(&self, title: &str, body: &str) -> f64 {
        let title = title.to_lowercase();
        let body = body.to_lowercase();

        let mut score = 0.0;
        for term in &self.terms {
            let in_title = title.contains(&term.lowered);
            let in_body = body.contains(&term.lowered);
            if !in_title && !in_body {
                continue;
            }

            let mut contribution = term.keyword.contribution();
            if (in_title && term.whole_word_in(&title)) || (in_body && term.whole_word_in(&body)) {
                contribution *= WHOLE_WORD_BONUS;
            }
            if in_title {
                contribution *= TITLE_BONUS;
            }
            score += contribution;
        }

        score.min(MAX_RELEVANCE_SCORE)
    }

    pub fn matched_terms(&self, title: &str, body: &str) -> BTreeSet<String> {
        let title = title.to_lowercase();
        let body = body.to_lowercase();
        self.terms
            .iter()
            .filter(|t| title.contains(&t.lowered) || body.contains(&t.lowered))
            .map(|t| t.keyword.term.clone())
            .collect()
    }
}
