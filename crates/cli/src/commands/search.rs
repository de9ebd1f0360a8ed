use std::sync::Arc;

use procura_core::config::{AppConfig, LoadOptions};
use procura_core::{
    InvoiceService, PriceListService, PurchaseOrderService, RecordDomain, RecordStore,
    SearchResult,
};
use procura_db::{DbPool, SqlArtifactSink, SqlRecordStore};
use serde_json::{json, Value};

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

pub fn run(options: LoadOptions, domain: &str, owner_id: &str, criteria: &str) -> CommandResult {
    let domain = match domain.parse::<RecordDomain>() {
        Ok(domain) => domain,
        Err(error) => return CommandResult::failure("search", "invalid_domain", error.to_string(), 2),
    };
    let criteria = match parse_criteria(criteria) {
        Ok(criteria) => criteria,
        Err(message) => return CommandResult::failure("search", "invalid_criteria", message, 2),
    };

    let config = match load_config("search", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("search") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let searched = search(&config, &pool, domain, owner_id, criteria).await;
        pool.close().await;
        searched
    });

    match result {
        Ok(result) => CommandResult::success_with_data(
            "search",
            format!("{} {} records matched", result.total_count, domain),
            Some(render(&result)),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("search", error_class, message, exit_code)
        }
    }
}

fn parse_criteria(raw: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|error| format!("--criteria must be a JSON object: {error}"))?;
    if !value.is_object() {
        return Err("--criteria must be a JSON object".to_string());
    }
    Ok(value)
}

async fn search(
    config: &AppConfig,
    pool: &DbPool,
    domain: RecordDomain,
    owner_id: &str,
    criteria: Value,
) -> Result<SearchResult, (&'static str, String, u8)> {
    let invalid = |error: serde_json::Error| ("invalid_criteria", error.to_string(), 2u8);
    let failed = |error: procura_core::SearchError| ("search_failed", error.to_string(), 6u8);
    let store: Arc<dyn RecordStore> = Arc::new(SqlRecordStore::new(pool.clone()));

    match domain {
        RecordDomain::PurchaseOrders => {
            let criteria = serde_json::from_value(criteria).map_err(invalid)?;
            PurchaseOrderService::new(store, Arc::new(SqlArtifactSink::new(pool.clone())))
                .search(owner_id, &criteria)
                .await
                .map_err(failed)
        }
        RecordDomain::Invoices => {
            let criteria = serde_json::from_value(criteria).map_err(invalid)?;
            InvoiceService::new(store).search(owner_id, &criteria).await.map_err(failed)
        }
        RecordDomain::PriceList => {
            let criteria = serde_json::from_value(criteria).map_err(invalid)?;
            PriceListService::new(store)
                .with_default_limit(config.assistant.price_list_default_limit)
                .search(owner_id, &criteria)
                .await
                .map_err(failed)
        }
    }
}

fn render(result: &SearchResult) -> Value {
    json!({
        "totalCount": result.total_count,
        "records": result.records.iter().map(|record| &record.fields).collect::<Vec<_>>(),
        "criteria": result.criteria_echo,
        "elapsedMs": result.elapsed_ms,
        "diagnostics": result.diagnostics,
    })
}
