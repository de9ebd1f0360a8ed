//! The four functions the model may call: three searches and order creation.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use procura_core::config::AssistantConfig;
use procura_core::{
    ArtifactSink, CreateOrderRequest, InvoiceCriteria, InvoiceService, PriceListCriteria,
    PriceListService, PurchaseOrderCriteria, PurchaseOrderService, RecordStore, SearchResult,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::llm::FunctionDeclaration;
use crate::tools::{Tool, ToolContext, ToolRegistry};

pub const SEARCH_PURCHASE_ORDERS: &str = "searchPurchaseOrders";
pub const SEARCH_INVOICES: &str = "searchInvoices";
pub const SEARCH_PRICE_LIST: &str = "searchPriceList";
pub const CREATE_PURCHASE_ORDER: &str = "createPurchaseOrder";

/// Registry with every procurement function wired to the given stores.
pub fn procurement_registry(
    store: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactSink>,
    settings: &AssistantConfig,
) -> ToolRegistry {
    let orders = PurchaseOrderService::new(store.clone(), artifacts);
    let max_records = settings.max_records_per_response;

    let mut registry = ToolRegistry::default();
    registry.register(SearchPurchaseOrders { service: orders.clone(), max_records });
    registry.register(SearchInvoices { service: InvoiceService::new(store.clone()), max_records });
    registry.register(SearchPriceList {
        service: PriceListService::new(store)
            .with_default_limit(settings.price_list_default_limit),
        max_records,
    });
    registry.register(CreatePurchaseOrder { service: orders });
    registry
}

pub struct SearchPurchaseOrders {
    service: PurchaseOrderService,
    max_records: usize,
}

#[async_trait]
impl Tool for SearchPurchaseOrders {
    fn name(&self) -> &'static str {
        SEARCH_PURCHASE_ORDERS
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: SEARCH_PURCHASE_ORDERS.to_string(),
            description: "Search the user's uploaded purchase orders. Every parameter is optional; \
                          calling without parameters returns all purchase orders."
                .to_string(),
            parameters: object_schema(
                &[
                    ("supplierName", "Part of the supplier name, case-insensitive."),
                    ("productDescription", "Part of the product description or name."),
                    ("dateFrom", "Earliest order date, YYYY-MM-DD."),
                    ("dateTo", "Latest order date, YYYY-MM-DD."),
                    ("buyerName", "Part of the buyer or orderer name."),
                ],
                &[],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let criteria: PurchaseOrderCriteria = arguments(input)?;
        let result = self
            .service
            .search(&context.owner_id, &criteria)
            .await
            .context("purchase order search failed")?;
        Ok(search_response(result, self.max_records))
    }
}

pub struct SearchInvoices {
    service: InvoiceService,
    max_records: usize,
}

#[async_trait]
impl Tool for SearchInvoices {
    fn name(&self) -> &'static str {
        SEARCH_INVOICES
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: SEARCH_INVOICES.to_string(),
            description: "Search the user's uploaded sales invoices. Every parameter is optional; \
                          calling without parameters returns all invoices."
                .to_string(),
            parameters: object_schema(
                &[
                    ("customerName", "Part of the customer name, case-insensitive."),
                    ("serviceDescription", "Part of the service or product description."),
                    ("invoiceDateFrom", "Earliest invoice date, YYYY-MM-DD."),
                    ("invoiceDateTo", "Latest invoice date, YYYY-MM-DD."),
                    ("dueDateFrom", "Earliest due date, YYYY-MM-DD."),
                    ("dueDateTo", "Latest due date, YYYY-MM-DD."),
                    ("approverName", "Part of the approver name."),
                    ("paymentStatus", "Payment status text, for example paid or open."),
                ],
                &[],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let criteria: InvoiceCriteria = arguments(input)?;
        let result = self
            .service
            .search(&context.owner_id, &criteria)
            .await
            .context("invoice search failed")?;
        Ok(search_response(result, self.max_records))
    }
}

pub struct SearchPriceList {
    service: PriceListService,
    max_records: usize,
}

#[async_trait]
impl Tool for SearchPriceList {
    fn name(&self) -> &'static str {
        SEARCH_PRICE_LIST
    }

    fn declaration(&self) -> FunctionDeclaration {
        let mut parameters = object_schema(
            &[
                ("productName", "Part of the product name or code."),
                ("priceListName", "Part of the price list name."),
                ("priceListSupplier", "Part of the price list supplier name."),
            ],
            &[],
        );
        parameters["properties"]["limit"] = json!({
            "type": "integer",
            "description": "Maximum number of rows to return."
        });

        FunctionDeclaration {
            name: SEARCH_PRICE_LIST.to_string(),
            description: "Search the user's price lists. At least one of productName, \
                          priceListName or priceListSupplier must be given; without them \
                          nothing is returned."
                .to_string(),
            parameters,
        }
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let criteria: PriceListCriteria = arguments(input)?;
        let result = self
            .service
            .search(&context.owner_id, &criteria)
            .await
            .context("price list search failed")?;
        Ok(search_response(result, self.max_records))
    }
}

pub struct CreatePurchaseOrder {
    service: PurchaseOrderService,
}

#[async_trait]
impl Tool for CreatePurchaseOrder {
    fn name(&self) -> &'static str {
        CREATE_PURCHASE_ORDER
    }

    fn declaration(&self) -> FunctionDeclaration {
        let mut parameters = object_schema(
            &[
                ("orderNumber", "Identifier of the new order."),
                ("supplierName", "Supplier the order is sent to."),
                ("buyerName", "Person placing the order."),
                ("orderDate", "Order date, YYYY-MM-DD."),
                ("receiveByDate", "Requested delivery date, YYYY-MM-DD."),
            ],
            &["orderNumber", "supplierName", "buyerName", "orderDate", "rows"],
        );
        parameters["properties"]["rows"] = json!({
            "type": "array",
            "description": "Order lines.",
            "items": {
                "type": "object",
                "properties": {
                    "productCode": { "type": "string" },
                    "description": { "type": "string" },
                    "quantity": { "type": "number" },
                    "unit": { "type": "string" },
                    "unitPrice": { "type": "number" }
                },
                "required": ["description", "quantity", "unitPrice"]
            }
        });

        FunctionDeclaration {
            name: CREATE_PURCHASE_ORDER.to_string(),
            description: "Create a purchase order, store it as a CSV file and add its rows to \
                          the user's purchase orders."
                .to_string(),
            parameters,
        }
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let request: CreateOrderRequest = arguments(input)?;
        let outcome = self.service.create_order(&context.owner_id, &request).await;
        serde_json::to_value(outcome).context("could not encode order outcome")
    }
}

/// Model arguments; a missing `args` object means no arguments at all.
fn arguments<T: DeserializeOwned>(input: Value) -> Result<T> {
    let input = match input {
        Value::Null => Value::Object(Map::new()),
        object @ Value::Object(_) => object,
        _ => bail!("invalid function arguments: expected an object"),
    };
    serde_json::from_value(input).context("invalid function arguments")
}

fn search_response(result: SearchResult, max_records: usize) -> Value {
    let truncated = result.records.len() > max_records;
    let records: Vec<_> = result.records.iter().take(max_records).map(|record| &record.fields).collect();

    json!({
        "success": true,
        "totalCount": result.total_count,
        "returned": records.len(),
        "truncated": truncated,
        "records": records,
        "criteria": result.criteria_echo,
        "unresolvedFields": result.diagnostics.unresolved_fields,
        "ignoredBounds": result.diagnostics.ignored_bounds,
    })
}

fn object_schema(properties: &[(&str, &str)], required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(name, description)| {
            ((*name).to_string(), json!({ "type": "string", "description": description }))
        })
        .collect();

    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}
