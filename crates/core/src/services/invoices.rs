use std::sync::Arc;
use std::time::Instant;

use crate::domain::criteria::{present, InvoiceCriteria};
use crate::search::{self, FilterSet, LogicalField, SearchError, SearchResult};
use crate::store::{RecordDomain, RecordStore};

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn RecordStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn filters(criteria: &InvoiceCriteria) -> FilterSet {
        FilterSet::new()
            .contains(LogicalField::CustomerName, present(&criteria.customer_name))
            .contains(LogicalField::ServiceDescription, present(&criteria.service_description))
            .date_range(
                LogicalField::InvoiceDate,
                present(&criteria.invoice_date_from),
                present(&criteria.invoice_date_to),
            )
            .date_range(
                LogicalField::DueDate,
                present(&criteria.due_date_from),
                present(&criteria.due_date_to),
            )
            .contains(LogicalField::ApproverName, present(&criteria.approver_name))
            .contains(LogicalField::PaymentStatus, present(&criteria.payment_status))
    }

    pub async fn search(
        &self,
        owner_id: &str,
        criteria: &InvoiceCriteria,
    ) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let batches = self.store.list_records(owner_id, RecordDomain::Invoices).await?;
        let filters = Self::filters(criteria);
        let echo = serde_json::to_value(criteria).unwrap_or_default();

        let result = search::execute(batches, &filters, echo, started);
        tracing::info!(
            event_name = "search.invoices",
            owner_id,
            total_count = result.total_count,
            scanned = result.diagnostics.scanned,
            elapsed_ms = result.elapsed_ms,
            "invoice search completed"
        );
        Ok(result)
    }
}
