//! CSV rendering and content fingerprints for generated artifacts.

use rust_decimal::Decimal;

use crate::domain::order::{CreateOrderRequest, OrderRow};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

const ORDER_COLUMNS: [&str; 11] = [
    "Order Number",
    "Supplier Name",
    "Buyer Name",
    "Order Date",
    "Receive By Date",
    "Product Code",
    "Product Description",
    "Quantity",
    "Unit",
    "Unit Price",
    "Total",
];

/// Hex blake3 digest of the artifact bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Stable handle for stored content: `<name>@<first 16 hex chars of the digest>`.
pub fn artifact_handle(name: &str, bytes: &[u8]) -> String {
    let digest = fingerprint(bytes);
    format!("{name}@{}", &digest[..16])
}

pub fn order_file_name(order_number: &str) -> String {
    let slug: String = order_number
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    format!("purchase-order-{slug}.csv")
}

/// One header line plus one line per accepted row, CRLF terminated.
pub fn order_csv(request: &CreateOrderRequest, rows: &[OrderRow]) -> Vec<u8> {
    let mut out = String::new();
    push_line(&mut out, ORDER_COLUMNS.iter().map(|column| column.to_string()));

    for row in rows {
        push_line(
            &mut out,
            [
                request.order_number.trim().to_string(),
                request.supplier_name.trim().to_string(),
                request.buyer_name.trim().to_string(),
                request.order_date.trim().to_string(),
                request.receive_by_date.as_deref().unwrap_or("").trim().to_string(),
                row.product_code.clone().unwrap_or_default(),
                row.description.clone(),
                decimal_text(row.quantity),
                row.unit.clone().unwrap_or_default(),
                decimal_text(row.unit_price),
                decimal_text(row.total),
            ]
            .into_iter(),
        );
    }

    out.into_bytes()
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>) {
    let line: Vec<String> = cells.map(|cell| csv_escape(&cell)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

/// RFC 4180 quoting.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{artifact_handle, fingerprint, order_csv, order_file_name};
    use crate::domain::order::{CreateOrderRequest, OrderRow};

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            order_number: "PO-1001".to_string(),
            supplier_name: "Huolto-Karhu Oy".to_string(),
            buyer_name: "Maija Meikäläinen".to_string(),
            order_date: "2024-06-01".to_string(),
            receive_by_date: None,
            rows: Vec::new(),
        }
    }

    #[test]
    fn csv_quotes_cells_with_separators() {
        let rows = vec![OrderRow {
            row_index: 1,
            product_code: Some("F-10".to_string()),
            description: "Filter, \"large\"".to_string(),
            quantity: Decimal::new(3, 0),
            unit: Some("pcs".to_string()),
            unit_price: Decimal::new(1050, 2),
            total: Decimal::new(3150, 2),
        }];

        let csv = String::from_utf8(order_csv(&request(), &rows)).expect("utf8");
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert!(lines[0].starts_with("Order Number,Supplier Name"));
        assert_eq!(
            lines[1],
            "PO-1001,Huolto-Karhu Oy,Maija Meikäläinen,2024-06-01,,F-10,\"Filter, \"\"large\"\"\",3,pcs,10.5,31.5"
        );
    }

    #[test]
    fn handles_are_content_addressed() {
        let first = artifact_handle("a.csv", b"one");
        assert_eq!(first, artifact_handle("a.csv", b"one"));
        assert_ne!(first, artifact_handle("a.csv", b"two"));
        assert!(first.starts_with("a.csv@"));
        assert_eq!(fingerprint(b"one").len(), 64);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(order_file_name("PO 7/2024"), "purchase-order-PO_7_2024.csv");
    }
}
