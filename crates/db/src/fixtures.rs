//! Demo dataset for `procura seed`: one upload per domain with the header
//! spellings real uploads use (English and Finnish mixed, serial and textual
//! dates side by side).

use procura_core::domain::record::{CellValue, LooseRecord};
use procura_core::store::{CollectionKey, RecordDomain, RecordStore, StoreError};
use serde::Serialize;

pub const DEMO_BATCH_ID: &str = "demo-seed";

const PURCHASE_ORDER_HEADERS: [&str; 7] = [
    "Order Number",
    "Supplier Name",
    "Product Description",
    "Order Date",
    "Buyer Name",
    "Quantity",
    "Unit Price",
];

const PURCHASE_ORDERS: &[(&str, &str, &str, Cell, &str, f64, f64)] = &[
    ("PO-1001", "Huolto-Karhu Oy", "Hydraulic oil filter", Cell::Text("2024-01-15"), "Maija Virtanen", 12.0, 18.5),
    ("PO-1002", "TechCorp Ltd", "Laptop docking station", Cell::Text("02/03/2024"), "John Smith", 4.0, 149.0),
    ("PO-1003", "Huolto-Karhu Oy", "Service kit, annual", Cell::Serial(45383.0), "Maija Virtanen", 1.0, 420.0),
    ("PO-1004", "Lahden Rauta Oy", "Safety gloves (pair)", Cell::Text("18.04.2024"), "Pekka Nieminen", 50.0, 6.9),
    ("PO-1005", "TechCorp Ltd", "USB-C cable 2 m", Cell::Text("5/7/2024"), "John Smith", 30.0, 12.0),
    ("PO-1006", "Nordic Office Supply", "Printer paper A4", Cell::Text("3.6.2024"), "Pekka Nieminen", 40.0, 5.25),
];

const INVOICE_HEADERS: [&str; 8] = [
    "Invoice Number",
    "Customer Name",
    "Service Description",
    "Invoice Date",
    "Due Date",
    "Approver",
    "Payment Status",
    "Amount",
];

const INVOICES: &[(&str, &str, &str, Cell, Cell, &str, &str, f64)] = &[
    ("INV-2001", "Kiinteistö Oy Lahti", "HVAC maintenance", Cell::Text("2024-02-01"), Cell::Text("2024-03-02"), "Anna Korhonen", "Paid", 1840.0),
    ("INV-2002", "Metsä Group", "Forklift repair", Cell::Serial(45366.0), Cell::Text("14.04.2024"), "Anna Korhonen", "Open", 960.0),
    ("INV-2003", "Kiinteistö Oy Lahti", "Elevator inspection", Cell::Text("04/22/2024"), Cell::Text("05/22/2024"), "Mikko Laine", "Overdue", 450.0),
    ("INV-2004", "City of Espoo", "Snow removal, March", Cell::Text("2024-03-31"), Cell::Serial(45412.0), "Mikko Laine", "Paid", 3200.0),
    ("INV-2005", "Metsä Group", "Hydraulic hose replacement", Cell::Text("6.5.2024"), Cell::Text("5.6.2024"), "Anna Korhonen", "Open", 275.5),
];

const PRICE_LIST_HEADERS: [&str; 5] = ["Product Name", "Price List", "Supplier", "Unit", "Unit Price"];

const PRICE_LIST: &[(&str, &str, &str, &str, f64)] = &[
    ("Hydraulic oil filter", "Spring 2024", "Huolto-Karhu Oy", "pcs", 17.9),
    ("Service kit, annual", "Spring 2024", "Huolto-Karhu Oy", "set", 399.0),
    ("Laptop docking station", "IT accessories", "TechCorp Ltd", "pcs", 139.0),
    ("USB-C cable 2 m", "IT accessories", "TechCorp Ltd", "pcs", 11.5),
    ("Safety gloves (pair)", "Workwear", "Lahden Rauta Oy", "pair", 6.5),
    ("Printer paper A4", "Office 2024", "Nordic Office Supply", "box", 4.95),
];

#[derive(Clone, Copy)]
enum Cell {
    Text(&'static str),
    Serial(f64),
}

impl From<Cell> for CellValue {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Text(text) => CellValue::from(text),
            Cell::Serial(serial) => CellValue::Number(serial),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub purchase_orders: usize,
    pub invoices: usize,
    pub price_list: usize,
}

impl SeedResult {
    pub fn total(&self) -> usize {
        self.purchase_orders + self.invoices + self.price_list
    }
}

pub struct DemoDataset;

impl DemoDataset {
    pub fn purchase_orders() -> Vec<LooseRecord> {
        PURCHASE_ORDERS
            .iter()
            .enumerate()
            .map(|(index, (number, supplier, product, date, buyer, quantity, price))| {
                let cells: [CellValue; 7] = [
                    (*number).into(),
                    (*supplier).into(),
                    (*product).into(),
                    (*date).into(),
                    (*buyer).into(),
                    (*quantity).into(),
                    (*price).into(),
                ];
                row(index, &PURCHASE_ORDER_HEADERS, cells)
            })
            .collect()
    }

    pub fn invoices() -> Vec<LooseRecord> {
        INVOICES
            .iter()
            .enumerate()
            .map(|(index, (number, customer, service, issued, due, approver, status, amount))| {
                let cells: [CellValue; 8] = [
                    (*number).into(),
                    (*customer).into(),
                    (*service).into(),
                    (*issued).into(),
                    (*due).into(),
                    (*approver).into(),
                    (*status).into(),
                    (*amount).into(),
                ];
                row(index, &INVOICE_HEADERS, cells)
            })
            .collect()
    }

    pub fn price_list() -> Vec<LooseRecord> {
        PRICE_LIST
            .iter()
            .enumerate()
            .map(|(index, (product, list, supplier, unit, price))| {
                let cells: [CellValue; 5] = [
                    (*product).into(),
                    (*list).into(),
                    (*supplier).into(),
                    (*unit).into(),
                    (*price).into(),
                ];
                row(index, &PRICE_LIST_HEADERS, cells)
            })
            .collect()
    }

    /// Write the demo batches for `owner_id`. Re-running replaces the rows in
    /// place because record ids are stable.
    pub async fn load(store: &dyn RecordStore, owner_id: &str) -> Result<SeedResult, StoreError> {
        let mut result = SeedResult::default();

        for domain in RecordDomain::ALL {
            let records = match domain {
                RecordDomain::PurchaseOrders => Self::purchase_orders(),
                RecordDomain::Invoices => Self::invoices(),
                RecordDomain::PriceList => Self::price_list(),
            };
            let collection = CollectionKey::new(owner_id, domain, DEMO_BATCH_ID);
            let count = records.len();
            for record in records {
                let record_id = format!("row-{:05}", record.row_index);
                store.put_record(&collection, &record_id, record).await?;
            }

            match domain {
                RecordDomain::PurchaseOrders => result.purchase_orders = count,
                RecordDomain::Invoices => result.invoices = count,
                RecordDomain::PriceList => result.price_list = count,
            }
        }

        tracing::info!(
            event_name = "db.demo_seeded",
            owner_id,
            records = result.total(),
            "demo dataset loaded"
        );
        Ok(result)
    }

    pub async fn clean(store: &dyn RecordStore, owner_id: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for domain in RecordDomain::ALL {
            removed += store.delete_batch(&CollectionKey::new(owner_id, domain, DEMO_BATCH_ID)).await?;
        }
        Ok(removed)
    }
}

fn row<const N: usize>(index: usize, headers: &[&str; N], cells: [CellValue; N]) -> LooseRecord {
    headers.iter().zip(cells).fold(LooseRecord::new(index), |record, (header, cell)| {
        record.with_field(*header, cell)
    })
}

#[cfg(test)]
mod tests {
    use procura_core::search::dates::parse_cell_date;
    use procura_core::search::fields::{resolve_column, LogicalField};

    use super::DemoDataset;
    use crate::repositories::InMemoryRecordStore;

    #[test]
    fn every_demo_date_parses() {
        for record in DemoDataset::purchase_orders() {
            let cell = record.get("Order Date").expect("order date");
            assert!(parse_cell_date(cell).is_some(), "{cell:?}");
        }
        for record in DemoDataset::invoices() {
            for column in ["Invoice Date", "Due Date"] {
                let cell = record.get(column).expect("date column");
                assert!(parse_cell_date(cell).is_some(), "{column}: {cell:?}");
            }
        }
    }

    #[test]
    fn demo_headers_resolve_to_logical_fields() {
        let invoices = DemoDataset::invoices();
        let headers: Vec<&str> = invoices[0].headers().collect();
        for field in [
            LogicalField::CustomerName,
            LogicalField::ServiceDescription,
            LogicalField::InvoiceDate,
            LogicalField::DueDate,
            LogicalField::ApproverName,
            LogicalField::PaymentStatus,
        ] {
            assert!(resolve_column(field, &headers).is_some(), "{field:?}");
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_clean_removes_everything() {
        let store = InMemoryRecordStore::new();

        let first = DemoDataset::load(&store, "demo").await.expect("seed");
        let second = DemoDataset::load(&store, "demo").await.expect("reseed");
        assert_eq!(first, second);

        let counts = procura_core::services::availability(&store, "demo").await.expect("counts");
        assert_eq!(counts.purchase_orders, first.purchase_orders);
        assert_eq!(counts.invoices, first.invoices);
        assert_eq!(counts.price_list, first.price_list);

        assert_eq!(DemoDataset::clean(&store, "demo").await.expect("clean"), first.total());
    }
}
