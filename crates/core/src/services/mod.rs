//! Per-domain search services and order creation.

pub mod artifact;
pub mod invoices;
pub mod price_list;
pub mod purchase_orders;

use serde::Serialize;

use crate::store::{RecordDomain, RecordStore, StoreError};

pub use invoices::InvoiceService;
pub use price_list::PriceListService;
pub use purchase_orders::PurchaseOrderService;

/// Record counts per domain for one owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAvailability {
    pub purchase_orders: usize,
    pub invoices: usize,
    pub price_list: usize,
}

impl DataAvailability {
    pub fn count(&self, domain: RecordDomain) -> usize {
        match domain {
            RecordDomain::PurchaseOrders => self.purchase_orders,
            RecordDomain::Invoices => self.invoices,
            RecordDomain::PriceList => self.price_list,
        }
    }

    /// Machine-readable note appended to user turns.
    pub fn note(&self) -> String {
        format!(
            "[data-availability] purchase_orders={} invoices={} price_list={}",
            self.purchase_orders, self.invoices, self.price_list
        )
    }
}

pub async fn availability(
    store: &dyn RecordStore,
    owner_id: &str,
) -> Result<DataAvailability, StoreError> {
    let mut counts = DataAvailability::default();
    for domain in RecordDomain::ALL {
        let total = store
            .list_records(owner_id, domain)
            .await?
            .iter()
            .map(|batch| batch.records.len())
            .sum();
        match domain {
            RecordDomain::PurchaseOrders => counts.purchase_orders = total,
            RecordDomain::Invoices => counts.invoices = total,
            RecordDomain::PriceList => counts.price_list = total,
        }
    }
    Ok(counts)
}
