//! UniProtKB REST API.

use lyra_core::analysis::UniProtAnnotations;
use lyra_core::WorkUnit;

use crate::http::{classes, FetchError, HttpRequest, ResilientFetcher};

#[derive(Debug, Clone)]
pub struct UniProtClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl UniProtClient {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Annotations of one entry, or `None` if UniProt does not know it.
    pub async fn annotations(&self, unit: &WorkUnit) -> Result<Option<UniProtAnnotations>, FetchError> {
        let request = HttpRequest::get(format!("{}/{}.json", self.base_url, unit));
        match self
            .fetcher
            .get_json(&request, classes::UNIPROT_ANNOTATION)
            .await
        {
            Ok(entry) => Ok(Some(UniProtAnnotations::from_entry(unit.as_str(), &entry))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
