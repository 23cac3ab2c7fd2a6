//! Healthcare classification of EU notices by CPV code and diagnostic wording.

use std::collections::HashMap;

/// CPV divisions counted as healthcare: medical equipment,
/// laboratory instruments, research and development, health services.
const HEALTHCARE_DIVISIONS: [&str; 4] = ["33", "38", "73", "85"];

/// Individual codes outside those divisions that still count.
const HEALTHCARE_CODES: [&str; 4] = ["72000000", "72200000", "72500000", "72600000"];

const CPV_WEIGHT: f64 = 0.5;
const TITLE_WEIGHT: f64 = 0.3;
const DESCRIPTION_WEIGHT: f64 = 0.2;

/// Default threshold for `is_healthcare_relevant`.
pub const DEFAULT_HEALTHCARE_THRESHOLD: f64 = 0.3;

pub struct CpvClassifier {
    keywords: HashMap<&'static str, Vec<String>>,
}

impl CpvClassifier {
    pub fn new() -> Self {
        let table: [(&'static str, &[&str]); 5] = [
            (
                "en",
                &[
                    "diagnostic", "test kit", "assay", "reagent", "pcr", "rt-pcr", "elisa",
                    "immunoassay", "lateral flow", "point of care", "covid", "coronavirus",
                    "influenza", "respiratory", "molecular diagnostic", "in vitro diagnostic",
                    "ivd", "pathogen detection", "biomarker", "screening",
                ],
            ),
            (
                "ko",
                &[
                    "진단키트", "진단", "검사키트", "시약", "pcr", "rt-pcr", "면역분석",
                    "측면유동", "현장진료", "코로나", "인플루엔자", "호흡기", "분자진단",
                    "체외진단", "병원체검출", "스크리닝",
                ],
            ),
            (
                "fr",
                &[
                    "diagnostic", "trousse de test", "réactif", "pcr", "immunoessai",
                    "point de soins", "covid", "grippe",
                ],
            ),
            (
                "de",
                &[
                    "diagnostik", "testkit", "reagenz", "pcr", "immunoassay", "point-of-care",
                    "covid", "grippe",
                ],
            ),
            (
                "es",
                &[
                    "diagnóstico", "kit de prueba", "reactivo", "pcr", "inmunoensayo",
                    "punto de atención", "covid", "gripe",
                ],
            ),
        ];

        let keywords = table
            .into_iter()
            .map(|(lang, words)| (lang, words.iter().map(|w| w.to_lowercase()).collect()))
            .collect();
        Self { keywords }
    }

    /// Whether a CPV code (any punctuation, optional check digit) is healthcare.
    pub fn is_healthcare_cpv(&self, code: &str) -> bool {
        let digits: String = code.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 2 {
            return false;
        }
        if digits.len() >= 8 && HEALTHCARE_CODES.contains(&&digits[..8]) {
            return true;
        }
        HEALTHCARE_DIVISIONS.contains(&&digits[..2])
    }

    /// Whether text mentions a diagnostic term. An unknown or missing language
    /// checks every language's vocabulary.
    pub fn is_diagnostic_text(&self, text: &str, language: Option<&str>) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        let lists: Vec<&Vec<String>> = match language.and_then(|l| self.keywords.get(l)) {
            Some(list) => vec![list],
            None => self.keywords.values().collect(),
        };
        lists.iter().any(|list| list.iter().any(|kw| text.contains(kw.as_str())))
    }

    /// Healthcare relevance in `[0, 1]`: share of healthcare CPV codes (0.5),
    /// diagnostic title (0.3), diagnostic description (0.2).
    pub fn healthcare_score(
        &self,
        cpv_codes: &[String],
        title: &str,
        description: &str,
        language: Option<&str>,
    ) -> f64 {
        let mut score = 0.0;
        if !cpv_codes.is_empty() {
            let matches = cpv_codes.iter().filter(|c| self.is_healthcare_cpv(c)).count();
            score += CPV_WEIGHT * (matches as f64 / cpv_codes.len() as f64);
        }
        if self.is_diagnostic_text(title, language) {
            score += TITLE_WEIGHT;
        }
        if self.is_diagnostic_text(description, language) {
            score += DESCRIPTION_WEIGHT;
        }
        score.min(1.0)
    }

    pub fn is_healthcare_relevant(
        &self,
        cpv_codes: &[String],
        title: &str,
        description: &str,
        language: Option<&str>,
    ) -> bool {
        self.healthcare_score(cpv_codes, title, description, language)
            >= DEFAULT_HEALTHCARE_THRESHOLD
    }
}

impl Default for CpvClassifier {
    fn default() -> Self {
        Self::new()
    }
}
