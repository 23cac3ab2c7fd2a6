pub mod boamp;
pub mod g2b;
pub mod samgov;
pub mod ted;
pub mod uk_fts;

use std::sync::Arc;

use anyhow::{bail, Result};
use tender_common::{Config, TenderRecord};
use tender_relevance::CpvClassifier;

use crate::adapter::{AdapterContext, AdapterDescriptor, RegisteredAdapter};
use crate::tagging::RecordTagger;

pub use boamp::{BoampAdapter, BOAMP_ID};
pub use g2b::{G2bAdapter, G2B_ID};
pub use samgov::{SamGovAdapter, SAMGOV_ID};
pub use ted::{TedAdapter, TED_ID};
pub use uk_fts::{UkFtsAdapter, UK_FTS_ID};

/// Every shipped adapter id, in registration order.
pub const ADAPTER_IDS: [&str; 5] = [G2B_ID, SAMGOV_ID, TED_ID, UK_FTS_ID, BOAMP_ID];

/// Build one adapter by id.
pub fn build_adapter(
    id: &str,
    config: &Config,
    context: &AdapterContext,
) -> Result<RegisteredAdapter> {
    let context = context.clone();
    let registered = match id {
        G2B_ID => RegisteredAdapter::new(
            AdapterDescriptor::new(G2B_ID, "ko").with_credentials(config.g2b_api_key.is_some()),
            Arc::new(G2bAdapter::new(config.g2b_api_key.clone(), context)),
        ),
        SAMGOV_ID => RegisteredAdapter::new(
            AdapterDescriptor::new(SAMGOV_ID, "en")
                .with_credentials(config.samgov_api_key.is_some()),
            Arc::new(SamGovAdapter::new(config.samgov_api_key.clone(), context)),
        ),
        TED_ID => RegisteredAdapter::new(
            AdapterDescriptor::new(TED_ID, "en"),
            Arc::new(TedAdapter::new(context)),
        ),
        UK_FTS_ID => RegisteredAdapter::new(
            AdapterDescriptor::new(UK_FTS_ID, "en"),
            Arc::new(UkFtsAdapter::new(context)),
        ),
        BOAMP_ID => RegisteredAdapter::new(
            AdapterDescriptor::new(BOAMP_ID, "fr"),
            Arc::new(BoampAdapter::new(context)),
        ),
        other => bail!(
            "Unknown adapter: {other}. Supported: {}",
            ADAPTER_IDS.join(", ")
        ),
    };
    Ok(registered)
}

/// Build the registry of enabled adapters.
pub fn build_adapters(config: &Config, context: &AdapterContext) -> Result<Vec<RegisteredAdapter>> {
    for id in &config.enabled_adapters {
        if !ADAPTER_IDS.iter().any(|known| known.eq_ignore_ascii_case(id)) {
            bail!("Unknown adapter in ENABLED_ADAPTERS: {id}");
        }
    }

    ADAPTER_IDS
        .iter()
        .filter(|id| config.adapter_enabled(id))
        .map(|id| build_adapter(id, config, context))
        .collect()
}

/// Client-side filter for sources that classify notices by CPV: keep keyword
/// matches and healthcare-classified notices.
pub(crate) fn keyword_or_healthcare(
    tagger: &RecordTagger,
    classifier: &CpvClassifier,
    record: &TenderRecord,
) -> bool {
    tagger.matches(record)
        || classifier.is_healthcare_relevant(
            &record.cpv_codes,
            &record.title,
            record.description.as_deref().unwrap_or_default(),
            record.language.as_deref(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tender_relevance::RelevanceEngine;

    fn context() -> AdapterContext {
        AdapterContext::new(Arc::new(RelevanceEngine::builtin()))
    }

    #[test]
    fn builds_all_adapters_by_default() {
        let config = Config::default();
        let adapters = build_adapters(&config, &context()).unwrap();
        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        assert_eq!(ids, ADAPTER_IDS.to_vec());

        let g2b = &adapters[0];
        assert!(g2b.descriptor.requires_credentials);
        assert!(!g2b.descriptor.schedulable());
        assert_eq!(g2b.adapter.name(), G2B_ID);
    }

    #[test]
    fn honours_enabled_list() {
        let config = Config {
            enabled_adapters: vec!["TED".into(), "BOAMP".into()],
            ..Config::default()
        };
        let adapters = build_adapters(&config, &context()).unwrap();
        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["TED", "BOAMP"]);
    }

    #[test]
    fn rejects_unknown_adapter() {
        let config = Config {
            enabled_adapters: vec!["NOPE".into()],
            ..Config::default()
        };
        assert!(build_adapters(&config, &context()).is_err());
        assert!(build_adapter("NOPE", &config, &context()).is_err());
    }
}
