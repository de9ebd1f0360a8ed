use std::sync::Arc;

use procura_core::domain::criteria::{InvoiceCriteria, PriceListCriteria, PurchaseOrderCriteria};
use procura_core::domain::order::CreateOrderRequest;
use procura_core::services::{InvoiceService, PriceListService, PurchaseOrderService};
use procura_core::store::{ArtifactSink, RecordDomain, RecordStore};
use procura_db::migrations::run_pending;
use procura_db::{
    connect_with_settings, DemoDataset, InMemoryArtifactSink, InMemoryRecordStore,
    SqlArtifactSink, SqlRecordStore,
};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

struct Backend {
    name: &'static str,
    store: Arc<dyn RecordStore>,
    artifacts: Arc<dyn ArtifactSink>,
    _dir: Option<tempfile::TempDir>,
}

async fn backends() -> ContractResult<Vec<Backend>> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let url = format!("sqlite://{}", dir.path().join("contract.db").display());
    let pool = connect_with_settings(&url, 2, 10).await.map_err(|err| err.to_string())?;
    run_pending(&pool).await.map_err(|err| err.to_string())?;

    Ok(vec![
        Backend {
            name: "memory",
            store: Arc::new(InMemoryRecordStore::new()),
            artifacts: Arc::new(InMemoryArtifactSink::default()),
            _dir: None,
        },
        Backend {
            name: "sqlite",
            store: Arc::new(SqlRecordStore::new(pool.clone())),
            artifacts: Arc::new(SqlArtifactSink::new(pool)),
            _dir: Some(dir),
        },
    ])
}

async fn seeded_search_contract(backend: &Backend) -> ContractResult {
    DemoDataset::load(backend.store.as_ref(), "owner-1").await.map_err(|err| err.to_string())?;

    let orders = PurchaseOrderService::new(backend.store.clone(), backend.artifacts.clone());
    let huolto = orders
        .search(
            "owner-1",
            &PurchaseOrderCriteria { supplier_name: Some("huolto".to_string()), ..Default::default() },
        )
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(huolto.total_count, 2);

    // 45383 is 2024-04-01; the dotted date is 2024-04-18.
    let april = orders
        .search(
            "owner-1",
            &PurchaseOrderCriteria {
                date_from: Some("2024-04-01".to_string()),
                date_to: Some("30.4.2024".to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(april.total_count, 2);

    let invoices = InvoiceService::new(backend.store.clone());
    let open = invoices
        .search(
            "owner-1",
            &InvoiceCriteria { payment_status: Some("open".to_string()), ..Default::default() },
        )
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(open.total_count, 2);

    let prices = PriceListService::new(backend.store.clone());
    let unfiltered =
        prices.search("owner-1", &PriceListCriteria::default()).await.map_err(|err| err.to_string())?;
    require!(unfiltered.records.is_empty(), "{}: unfiltered price list must be empty", backend.name);

    let other_owner = orders
        .search("owner-2", &PurchaseOrderCriteria::default())
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(other_owner.total_count, 0);
    Ok(())
}

async fn created_orders_are_searchable(backend: &Backend) -> ContractResult {
    let orders = PurchaseOrderService::new(backend.store.clone(), backend.artifacts.clone());
    let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
        "orderNumber": "PO-9001",
        "supplierName": "Huolto-Karhu Oy",
        "buyerName": "Maija Virtanen",
        "orderDate": "2024-08-01",
        "rows": [
            { "description": "Oil filter", "quantity": 3, "unitPrice": 10 },
            { "description": "Service kit", "quantity": 1, "unitPrice": 25 }
        ]
    }))
    .map_err(|err| err.to_string())?;

    let outcome = orders.create_order("owner-9", &request).await;
    require!(outcome.success, "{}: order creation failed: {:?}", backend.name, outcome.message);
    require_eq!(outcome.rows_added, 2);
    require_eq!(outcome.total_value.to_string(), "55");

    let batches = backend
        .store
        .list_records("owner-9", RecordDomain::PurchaseOrders)
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(batches.len(), 1);
    require_eq!(batches[0].batch_id.as_str(), "order-PO-9001");

    let found = orders
        .search(
            "owner-9",
            &PurchaseOrderCriteria { date_from: Some("2024-08-01".to_string()), ..Default::default() },
        )
        .await
        .map_err(|err| err.to_string())?;
    require_eq!(found.total_count, 2);
    Ok(())
}

#[tokio::test]
async fn both_backends_honour_the_search_contract() -> ContractResult {
    for backend in backends().await? {
        seeded_search_contract(&backend).await.map_err(|err| format!("{}: {err}", backend.name))?;
    }
    Ok(())
}

#[tokio::test]
async fn both_backends_persist_created_orders() -> ContractResult {
    for backend in backends().await? {
        created_orders_are_searchable(&backend)
            .await
            .map_err(|err| format!("{}: {err}", backend.name))?;
    }
    Ok(())
}
