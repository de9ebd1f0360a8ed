use procura_core::config::LoadOptions;
use procura_db::{DemoDataset, SeedResult, SqlRecordStore};

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

pub fn run(options: LoadOptions, owner_id: &str) -> CommandResult {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return CommandResult::failure("seed", "invalid_owner", "--owner must not be empty", 2);
    }

    let config = match load_config("seed", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store = SqlRecordStore::new(pool.clone());
        let seeded = DemoDataset::load(&store, owner_id)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8));
        pool.close().await;
        seeded
    });

    match result {
        Ok(seeded) => CommandResult::success_with_data(
            "seed",
            seed_message(owner_id, &seeded),
            serde_json::to_value(seeded).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_message(owner_id: &str, seeded: &SeedResult) -> String {
    format!(
        "demo dataset loaded for `{owner_id}`: {} purchase orders, {} invoices, {} price list rows",
        seeded.purchase_orders, seeded.invoices, seeded.price_list
    )
}
