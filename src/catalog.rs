use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::domain::{ExternalId, SpecialReport, SpecialReportLink};
use crate::error::TransformerError;
use crate::identity::derive_external_id;
use crate::tme::TermSource;
use crate::transform::transform_special_report;

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub taxonomy_name: String,
    pub page_size: usize,
}

#[derive(Debug, Default)]
struct Generation {
    raw_ids: HashMap<ExternalId, String>,
    links: Vec<SpecialReportLink>,
}

impl Generation {
    fn insert(&mut self, id: ExternalId, raw_id: &str, base_url: &str) -> bool {
        match self.raw_ids.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.links.push(SpecialReportLink::new(base_url, slot.key()));
                slot.insert(raw_id.to_string());
                true
            }
        }
    }
}

pub struct Catalog<S: TermSource> {
    source: S,
    settings: CatalogSettings,
    live: ArcSwap<Generation>,
    reload_lock: Mutex<()>,
}

impl<S: TermSource> Catalog<S> {
    pub fn load(source: S, settings: CatalogSettings) -> Result<Self, TransformerError> {
        if settings.page_size == 0 {
            return Err(TransformerError::InvalidConfig(
                "page size must be greater than zero".to_string(),
            ));
        }

        let catalog = Self {
            source,
            settings,
            live: ArcSwap::from_pointee(Generation::default()),
            reload_lock: Mutex::new(()),
        };
        catalog.reload()?;
        Ok(catalog)
    }

    pub fn reload(&self) -> Result<usize, TransformerError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = self.build_generation()?;
        let count = generation.raw_ids.len();
        self.live.store(Arc::new(generation));
        info!(count, "added special reports links");
        Ok(count)
    }

    pub fn count(&self) -> usize {
        self.live.load().raw_ids.len()
    }

    pub fn ids(&self) -> Vec<ExternalId> {
        self.live.load().raw_ids.keys().cloned().collect()
    }

    pub fn links(&self) -> Option<Vec<SpecialReportLink>> {
        let generation = self.live.load();
        if generation.links.is_empty() {
            return None;
        }
        Some(generation.links.clone())
    }

    pub fn get(&self, id: &str) -> Option<SpecialReport> {
        match self.lookup(id) {
            Ok(report) => Some(report),
            Err(TransformerError::NotFound(_)) => None,
            Err(err) => {
                warn!(uuid = id, error = %err, "failed to fetch special report from TME");
                None
            }
        }
    }

    fn lookup(&self, id: &str) -> Result<SpecialReport, TransformerError> {
        let raw_id = self
            .live
            .load()
            .raw_ids
            .get(id)
            .cloned()
            .ok_or_else(|| TransformerError::NotFound(id.to_string()))?;
        let term = self.source.fetch_by_raw_id(&raw_id)?;
        Ok(transform_special_report(
            &term,
            &self.settings.taxonomy_name,
        ))
    }

    pub fn check_connectivity(&self) -> Result<(), TransformerError> {
        self.source.check_connectivity()
    }

    fn build_generation(&self) -> Result<Generation, TransformerError> {
        let CatalogSettings {
            base_url,
            taxonomy_name,
            page_size,
        } = &self.settings;

        let mut generation = Generation::default();
        let mut offset = 0usize;
        info!(taxonomy = %taxonomy_name, "fetching special reports from TME");
        loop {
            let terms = self
                .source
                .list_page(offset)
                .map_err(|err| TransformerError::SourceUnavailable {
                    offset,
                    source: Box::new(err),
                })?;

            if terms.is_empty() {
                info!("finished fetching special reports from TME");
                break;
            }

            for term in &terms {
                let id = derive_external_id(&term.raw_id, taxonomy_name);
                if !generation.insert(id, &term.raw_id, base_url) {
                    warn!(raw_id = %term.raw_id, "skipping duplicate special report term");
                }
            }
            offset += page_size;
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::RawTerm;

    struct OneTerm {
        term: RawTerm,
        reachable: bool,
    }

    impl TermSource for OneTerm {
        fn list_page(&self, offset: usize) -> Result<Vec<RawTerm>, TransformerError> {
            if offset == 0 {
                return Ok(vec![self.term.clone()]);
            }
            Ok(Vec::new())
        }

        fn fetch_by_raw_id(&self, _raw_id: &str) -> Result<RawTerm, TransformerError> {
            if !self.reachable {
                return Err(TransformerError::TmeHttp("connection refused".to_string()));
            }
            Ok(self.term.clone())
        }

        fn check_connectivity(&self) -> Result<(), TransformerError> {
            Ok(())
        }
    }

    fn catalog(reachable: bool) -> Catalog<OneTerm> {
        let source = OneTerm {
            term: RawTerm::new("Z_Archive", "b8337559-ac08-3404-9025-bad51ebe2fc7"),
            reachable,
        };
        let settings = CatalogSettings {
            base_url: "http://x/".to_string(),
            taxonomy_name: "SpecialReports".to_string(),
            page_size: 10,
        };
        Catalog::load(source, settings).unwrap()
    }

    #[test]
    fn lookup_distinguishes_unknown_ids_from_upstream_failures() {
        let id = "ccd5cc74-1f1b-3ac6-a563-e36dff51926c";

        assert_eq!(catalog(true).lookup(id).unwrap().pref_label, "Z_Archive");
        assert_matches!(
            catalog(true).lookup("unknown"),
            Err(TransformerError::NotFound(missing)) if missing == "unknown"
        );
        assert_matches!(catalog(false).lookup(id), Err(TransformerError::TmeHttp(_)));
        assert_eq!(catalog(false).get(id), None);
    }
}
