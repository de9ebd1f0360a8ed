use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::domain::criteria::{present, PriceListCriteria};
use crate::search::{self, FilterSet, LogicalField, SearchError, SearchResult};
use crate::store::{RecordDomain, RecordStore};

pub const DEFAULT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct PriceListService {
    store: Arc<dyn RecordStore>,
    default_limit: usize,
}

impl PriceListService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, default_limit: DEFAULT_LIMIT }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    pub fn filters(criteria: &PriceListCriteria) -> FilterSet {
        FilterSet::new()
            .contains(LogicalField::ProductName, present(&criteria.product_name))
            .contains(LogicalField::PriceListName, present(&criteria.price_list_name))
            .contains(LogicalField::PriceListSupplier, present(&criteria.price_list_supplier))
    }

    /// Unlike the other domains, a search without any filter returns nothing
    /// instead of the whole price list. The store is not queried in that case.
    pub async fn search(
        &self,
        owner_id: &str,
        criteria: &PriceListCriteria,
    ) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let echo = serde_json::to_value(criteria).unwrap_or(Value::Null);

        if !criteria.has_filters() {
            tracing::info!(
                event_name = "search.price_list_unfiltered",
                owner_id,
                "price list search without filters returns no records"
            );
            return Ok(SearchResult::empty(echo, started));
        }

        let batches = self.store.list_records(owner_id, RecordDomain::PriceList).await?;
        let filters = Self::filters(criteria);
        let mut result = search::execute(batches, &filters, echo, started);
        let matched = result.total_count;
        result.truncate(criteria.limit.filter(|limit| *limit > 0).unwrap_or(self.default_limit));

        tracing::info!(
            event_name = "search.price_list",
            owner_id,
            matched,
            total_count = result.total_count,
            elapsed_ms = result.elapsed_ms,
            "price list search completed"
        );
        Ok(result)
    }
}
