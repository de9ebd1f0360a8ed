use std::sync::Arc;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::criteria::{present, PurchaseOrderCriteria};
use crate::domain::order::{CreateOrderOutcome, CreateOrderRequest, OrderRow, RowRejection};
use crate::domain::record::{CellValue, LooseRecord};
use crate::search::{self, FilterSet, LogicalField, SearchError, SearchResult};
use crate::services::artifact::{order_csv, order_file_name, CSV_CONTENT_TYPE};
use crate::store::{ArtifactSink, CollectionKey, RecordDomain, RecordStore};

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactSink>,
}

impl PurchaseOrderService {
    pub fn new(store: Arc<dyn RecordStore>, artifacts: Arc<dyn ArtifactSink>) -> Self {
        Self { store, artifacts }
    }

    pub fn filters(criteria: &PurchaseOrderCriteria) -> FilterSet {
        FilterSet::new()
            .contains(LogicalField::SupplierName, present(&criteria.supplier_name))
            .contains(LogicalField::ProductDescription, present(&criteria.product_description))
            .date_range(
                LogicalField::OrderDate,
                present(&criteria.date_from),
                present(&criteria.date_to),
            )
            .contains(LogicalField::BuyerName, present(&criteria.buyer_name))
    }

    /// Zero criteria returns every purchase-order record of the owner.
    pub async fn search(
        &self,
        owner_id: &str,
        criteria: &PurchaseOrderCriteria,
    ) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let batches = self.store.list_records(owner_id, RecordDomain::PurchaseOrders).await?;
        let filters = Self::filters(criteria);
        let echo = serde_json::to_value(criteria).unwrap_or_default();

        let result = search::execute(batches, &filters, echo, started);
        tracing::info!(
            event_name = "search.purchase_orders",
            owner_id,
            total_count = result.total_count,
            scanned = result.diagnostics.scanned,
            elapsed_ms = result.elapsed_ms,
            "purchase order search completed"
        );
        Ok(result)
    }

    /// Validate, price, archive and persist a new order.
    ///
    /// Failures never escape; they come back as `success: false` with a message.
    pub async fn create_order(
        &self,
        owner_id: &str,
        request: &CreateOrderRequest,
    ) -> CreateOrderOutcome {
        let missing = request.missing_header_fields();
        if !missing.is_empty() {
            return CreateOrderOutcome::failure(format!(
                "missing required fields: {}",
                missing.join(", ")
            ));
        }
        if request.rows.is_empty() {
            return CreateOrderOutcome::failure("an order needs at least one row");
        }

        let mut accepted: Vec<OrderRow> = Vec::new();
        let mut rejected: Vec<RowRejection> = Vec::new();
        for (position, raw) in request.rows.iter().enumerate() {
            match OrderRow::from_value(position + 1, raw) {
                Ok(row) => accepted.push(row),
                Err(rejection) => {
                    tracing::warn!(
                        event_name = "order.row_rejected",
                        order_number = %request.order_number,
                        row_index = rejection.row_index,
                        reason = %rejection.reason,
                        "order row rejected"
                    );
                    rejected.push(rejection);
                }
            }
        }

        let failed = |message: String, rejected: Vec<RowRejection>| {
            let mut outcome = CreateOrderOutcome::failure(message);
            outcome.rejected_rows = rejected;
            outcome
        };
        if accepted.is_empty() {
            return failed("no valid rows in order".to_string(), rejected);
        }

        let Some(total_value) = accepted
            .iter()
            .try_fold(Decimal::ZERO, |sum, row| sum.checked_add(row.total))
            .map(|total| total.normalize())
        else {
            return failed("order total out of range".to_string(), rejected);
        };
        let order_number = request.order_number.trim();
        let collection =
            CollectionKey::new(owner_id, RecordDomain::PurchaseOrders, format!("order-{order_number}"));

        // Re-creating an order replaces every row of the previous version.
        if let Err(error) = self.store.delete_batch(&collection).await {
            tracing::error!(
                event_name = "order.replace_failed",
                collection = %collection,
                error = %error,
                "clearing previous order rows failed"
            );
            return failed(format!("could not replace order {order_number}: {error}"), rejected);
        }

        for row in &accepted {
            let record_id = format!("{order_number}-{}", row.row_index);
            if let Err(error) =
                self.store.put_record(&collection, &record_id, order_record(request, row)).await
            {
                tracing::error!(
                    event_name = "order.persist_failed",
                    collection = %collection,
                    record_id = %record_id,
                    error = %error,
                    "persisting order row failed"
                );
                self.discard(&collection).await;
                return failed(format!("could not save order row {record_id}: {error}"), rejected);
            }
        }

        let csv = order_csv(request, &accepted);
        let handle = match self
            .artifacts
            .store_artifact(&order_file_name(order_number), CSV_CONTENT_TYPE, csv)
            .await
        {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(
                    event_name = "order.artifact_failed",
                    order_number,
                    error = %error,
                    "storing order artifact failed"
                );
                self.discard(&collection).await;
                return failed(format!("could not store order file: {error}"), rejected);
            }
        };

        tracing::info!(
            event_name = "order.created",
            owner_id,
            order_number,
            rows_added = accepted.len(),
            rows_rejected = rejected.len(),
            total_value = %total_value,
            artifact = %handle,
            "purchase order created"
        );

        CreateOrderOutcome {
            success: true,
            rows_added: accepted.len(),
            total_value,
            artifact_handle: Some(handle.0),
            rejected_rows: rejected,
            message: None,
        }
    }

    /// Remove the rows of a half-written order.
    async fn discard(&self, collection: &CollectionKey) {
        if let Err(error) = self.store.delete_batch(collection).await {
            tracing::warn!(
                event_name = "order.rollback_failed",
                collection = %collection,
                error = %error,
                "could not remove partially written order rows"
            );
        }
    }
}

/// Persisted shape of one order row. Headers use the spellings the field
/// resolver knows so created orders show up in later searches.
fn order_record(request: &CreateOrderRequest, row: &OrderRow) -> LooseRecord {
    let optional = |value: Option<&str>| match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(text) => CellValue::from(text),
        None => CellValue::Null,
    };

    LooseRecord::new(row.row_index)
        .with_field("Order Number", request.order_number.trim())
        .with_field("Supplier Name", request.supplier_name.trim())
        .with_field("Buyer Name", request.buyer_name.trim())
        .with_field("Order Date", request.order_date.trim())
        .with_field("Receive By Date", optional(request.receive_by_date.as_deref()))
        .with_field("Product Code", optional(row.product_code.as_deref()))
        .with_field("Product Description", row.description.as_str())
        .with_field("Quantity", decimal_cell(row.quantity))
        .with_field("Unit", optional(row.unit.as_deref()))
        .with_field("Unit Price", decimal_cell(row.unit_price))
        .with_field("Total", decimal_cell(row.total))
}

fn decimal_cell(value: Decimal) -> CellValue {
    value.to_f64().map(CellValue::Number).unwrap_or(CellValue::Null)
}
