//! Keyword expansion taxonomy.
//!
//! Each entry maps a canonical term to bounded lists of synonyms, related
//! terms, translations and abbreviations. Synonym lookups are bidirectional:
//! a term that appears as somebody's synonym finds that entry and its
//! siblings. The other kinds are looked up by canonical term only.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tender_common::DictionaryEntryConfig;

/// Where an expanded keyword came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    Original,
    Translation,
    Synonym,
    Abbreviation,
    Related,
}

impl KeywordKind {
    /// Expansion kinds in the order they are tried, strongest first.
    pub const EXPANSIONS: [KeywordKind; 4] = [
        KeywordKind::Translation,
        KeywordKind::Synonym,
        KeywordKind::Abbreviation,
        KeywordKind::Related,
    ];

    /// Fixed weight applied to every term of this kind.
    pub fn weight(self) -> f64 {
        match self {
            KeywordKind::Original => 1.0,
            KeywordKind::Translation => 0.95,
            KeywordKind::Synonym => 0.9,
            KeywordKind::Abbreviation => 0.85,
            KeywordKind::Related => 0.8,
        }
    }
}

impl fmt::Display for KeywordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordKind::Original => write!(f, "original"),
            KeywordKind::Translation => write!(f, "translation"),
            KeywordKind::Synonym => write!(f, "synonym"),
            KeywordKind::Abbreviation => write!(f, "abbreviation"),
            KeywordKind::Related => write!(f, "related"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordExpansionEntry {
    pub term: String,
    pub synonyms: Vec<String>,
    pub related_terms: Vec<String>,
    pub translations: Vec<String>,
    pub abbreviations: Vec<String>,
}

impl KeywordExpansionEntry {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into().trim().to_string(),
            synonyms: Vec::new(),
            related_terms: Vec::new(),
            translations: Vec::new(),
            abbreviations: Vec::new(),
        }
    }

    /// Append terms of `kind`, skipping blanks, duplicates and the entry's own term.
    pub fn with<I, S>(mut self, kind: KeywordKind, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(kind, terms);
        self
    }

    fn extend<I, S>(&mut self, kind: KeywordKind, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let own = self.term.to_lowercase();
        let Some(list) = self.list_mut(kind) else {
            return;
        };
        let mut seen: HashSet<String> = list.iter().map(|t| t.to_lowercase()).collect();
        for term in terms {
            let term = term.as_ref().trim();
            let key = term.to_lowercase();
            if term.is_empty() || key == own || !seen.insert(key) {
                continue;
            }
            list.push(term.to_string());
        }
    }

    pub fn terms(&self, kind: KeywordKind) -> &[String] {
        match kind {
            KeywordKind::Original => &[],
            KeywordKind::Translation => &self.translations,
            KeywordKind::Synonym => &self.synonyms,
            KeywordKind::Abbreviation => &self.abbreviations,
            KeywordKind::Related => &self.related_terms,
        }
    }

    fn list_mut(&mut self, kind: KeywordKind) -> Option<&mut Vec<String>> {
        match kind {
            KeywordKind::Original => None,
            KeywordKind::Translation => Some(&mut self.translations),
            KeywordKind::Synonym => Some(&mut self.synonyms),
            KeywordKind::Abbreviation => Some(&mut self.abbreviations),
            KeywordKind::Related => Some(&mut self.related_terms),
        }
    }

    fn merge(&mut self, other: KeywordExpansionEntry) {
        for kind in KeywordKind::EXPANSIONS {
            self.extend(kind, other.terms(kind).to_vec());
        }
    }
}

impl From<&DictionaryEntryConfig> for KeywordExpansionEntry {
    fn from(config: &DictionaryEntryConfig) -> Self {
        KeywordExpansionEntry::new(&config.term)
            .with(KeywordKind::Synonym, &config.synonyms)
            .with(KeywordKind::Related, &config.related_terms)
            .with(KeywordKind::Translation, &config.translations)
            .with(KeywordKind::Abbreviation, &config.abbreviations)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordDictionary {
    entries: Vec<KeywordExpansionEntry>,
    index: HashMap<String, usize>,
}

impl KeywordDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, merging into an existing entry with the same term.
    pub fn insert(&mut self, entry: KeywordExpansionEntry) {
        if entry.term.is_empty() {
            return;
        }
        let key = entry.term.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].merge(entry),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, term: &str) -> Option<&KeywordExpansionEntry> {
        self.index
            .get(&term.trim().to_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// Terms of `kind` for `term`, never including `term` itself.
    pub fn lookup(&self, term: &str, kind: KeywordKind) -> Vec<String> {
        let key = term.trim().to_lowercase();
        let mut seen = HashSet::from([key.clone()]);
        let mut out = Vec::new();
        let mut push = |t: &str| {
            if seen.insert(t.to_lowercase()) {
                out.push(t.to_string());
            }
        };

        if let Some(entry) = self.entry(&key) {
            entry.terms(kind).iter().for_each(|t| push(t.as_str()));
        }

        if kind == KeywordKind::Synonym {
            for entry in &self.entries {
                if entry.synonyms.iter().any(|s| s.to_lowercase() == key) {
                    push(entry.term.as_str());
                    entry.synonyms.iter().for_each(|t| push(t.as_str()));
                }
            }
        }

        out
    }

    /// The diagnostics taxonomy shipped with the engine.
    pub fn builtin() -> Self {
        let mut dictionary = Self::new();
        for (term, kind, terms) in BUILTIN_TAXONOMY {
            dictionary.insert(KeywordExpansionEntry::new(*term).with(*kind, terms.iter()));
        }
        dictionary
    }

    /// Built-in taxonomy extended with configured entries.
    pub fn with_entries(mut self, entries: &[DictionaryEntryConfig]) -> Self {
        for config in entries {
            self.insert(KeywordExpansionEntry::from(config));
        }
        self
    }
}

use KeywordKind::{Abbreviation, Related, Synonym, Translation};

const BUILTIN_TAXONOMY: &[(&str, KeywordKind, &[&str])] = &[
    // Korean synonyms
    ("PCR", Synonym, &["중합효소연쇄반응", "polymerase chain reaction", "RT-PCR"]),
    ("진단키트", Synonym, &["진단 키트", "진단 도구", "검사키트", "검사 키트"]),
    ("분자진단", Synonym, &["분자 진단", "molecular diagnosis", "molecular diagnostic"]),
    ("체외진단", Synonym, &["체외 진단", "IVD", "in vitro diagnostic"]),
    ("코로나", Synonym, &["COVID", "COVID-19", "신종코로나바이러스", "SARS-CoV-2"]),
    ("인플루엔자", Synonym, &["독감", "influenza", "flu"]),
    ("호흡기감염", Synonym, &["호흡기 감염", "respiratory infection"]),
    ("병원체검사", Synonym, &["병원체 검사", "pathogen test"]),
    // English synonyms
    ("diagnostic kit", Synonym, &["diagnostic tool", "test kit", "assay kit"]),
    ("molecular diagnostic", Synonym, &["molecular diagnosis", "molecular test"]),
    ("in vitro diagnostic", Synonym, &["IVD", "laboratory diagnostic"]),
    ("point of care", Synonym, &["POC", "point-of-care", "bedside test"]),
    ("respiratory pathogen", Synonym, &["respiratory infection", "lung infection"]),
    ("COVID test", Synonym, &["COVID-19 test", "coronavirus test", "SARS-CoV-2 test"]),
    ("influenza test", Synonym, &["flu test", "influenza diagnostic"]),
    ("rapid test", Synonym, &["quick test", "fast test", "instant test"]),
    ("antigen test", Synonym, &["antigen detection", "antigen assay"]),
    ("antibody test", Synonym, &["serology test", "serological test"]),
    // Related terms
    ("PCR", Related, &["qPCR", "real-time PCR", "정량PCR", "RT-qPCR", "nested PCR"]),
    ("진단키트", Related, &["래피드테스트", "항원검사", "항체검사", "면역크로마토그래피"]),
    ("분자진단", Related, &["LAMP", "NASBA", "TMA", "SDA", "RPA"]),
    ("체외진단", Related, &["임상화학", "면역검사", "혈액학", "미생물학"]),
    ("코로나", Related, &["팬데믹", "감염병", "바이러스", "변이"]),
    ("인플루엔자", Related, &["조류독감", "신종플루", "H1N1", "H5N1"]),
    ("호흡기감염", Related, &["폐렴", "기관지염", "상기도감염", "하기도감염"]),
    ("diagnostic kit", Related, &["biosensor", "microarray", "ELISA", "immunoassay"]),
    ("molecular diagnostic", Related, &["NGS", "sequencing", "genotyping", "mutation detection"]),
    ("point of care", Related, &["portable device", "handheld device", "mobile testing"]),
    ("COVID test", Related, &["pandemic", "outbreak", "epidemic", "variant"]),
    ("respiratory pathogen", Related, &["pneumonia", "bronchitis", "COPD", "asthma"]),
    // Translations
    ("PCR", Translation, &["polymerase chain reaction", "聚合酶链反应", "PCR检测"]),
    ("진단키트", Translation, &["diagnostic kit", "test kit"]),
    ("분자진단", Translation, &["molecular diagnostic", "molecular diagnosis"]),
    ("체외진단", Translation, &["in vitro diagnostic", "IVD"]),
    ("코로나", Translation, &["corona", "COVID", "coronavirus"]),
    ("인플루엔자", Translation, &["influenza", "flu"]),
    ("호흡기감염", Translation, &["respiratory infection"]),
    ("병원체검사", Translation, &["pathogen test", "pathogen detection"]),
    ("diagnostic kit", Translation, &["진단키트", "진단 키트", "诊断试剂盒", "检测试剂盒"]),
    ("molecular diagnostic", Translation, &["분자진단", "분자 진단"]),
    ("in vitro diagnostic", Translation, &["체외진단", "체외 진단"]),
    ("point of care", Translation, &["현장진료", "POC"]),
    ("COVID test", Translation, &["코로나검사", "코로나 검사", "新冠检测", "新冠病毒检测"]),
    ("influenza test", Translation, &["인플루엔자검사", "독감검사"]),
    ("respiratory pathogen", Translation, &["호흡기병원체", "호흡기 병원체"]),
    // Abbreviations, both directions
    ("PCR", Abbreviation, &["polymerase chain reaction", "중합효소연쇄반응"]),
    ("RT-PCR", Abbreviation, &["reverse transcription PCR", "역전사 PCR"]),
    ("qPCR", Abbreviation, &["quantitative PCR", "정량 PCR"]),
    ("IVD", Abbreviation, &["in vitro diagnostic", "체외진단"]),
    ("POC", Abbreviation, &["point of care", "현장진료"]),
    ("ELISA", Abbreviation, &["enzyme-linked immunosorbent assay", "효소면역측정법"]),
    ("NGS", Abbreviation, &["next generation sequencing", "차세대염기서열분석"]),
    ("LAMP", Abbreviation, &["loop-mediated isothermal amplification", "LAMP 증폭"]),
    ("COPD", Abbreviation, &["chronic obstructive pulmonary disease", "만성폐쇄성폐질환"]),
    ("polymerase chain reaction", Abbreviation, &["PCR"]),
    ("in vitro diagnostic", Abbreviation, &["IVD"]),
    ("point of care", Abbreviation, &["POC"]),
    ("enzyme-linked immunosorbent assay", Abbreviation, &["ELISA"]),
    ("next generation sequencing", Abbreviation, &["NGS"]),
    ("chronic obstructive pulmonary disease", Abbreviation, &["COPD"]),
];
