use std::collections::HashMap;

use serde::Serialize;

/// Logical columns the search services know how to look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalField {
    SupplierName,
    ProductDescription,
    OrderDate,
    BuyerName,
    CustomerName,
    ServiceDescription,
    InvoiceDate,
    DueDate,
    ApproverName,
    PaymentStatus,
    ProductName,
    PriceListName,
    PriceListSupplier,
    UnitPrice,
}

impl LogicalField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::SupplierName => "supplierName",
            Self::ProductDescription => "productDescription",
            Self::OrderDate => "orderDate",
            Self::BuyerName => "buyerName",
            Self::CustomerName => "customerName",
            Self::ServiceDescription => "serviceDescription",
            Self::InvoiceDate => "invoiceDate",
            Self::DueDate => "dueDate",
            Self::ApproverName => "approverName",
            Self::PaymentStatus => "paymentStatus",
            Self::ProductName => "productName",
            Self::PriceListName => "priceListName",
            Self::PriceListSupplier => "priceListSupplier",
            Self::UnitPrice => "unitPrice",
        }
    }

    /// Header spellings seen in uploads, most common first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::SupplierName => &["Supplier Name", "Supplier", "Vendor Name", "Vendor", "Toimittaja"],
            Self::ProductDescription => &[
                "Product Description",
                "Description",
                "Item Description",
                "Product",
                "Tuotekuvaus",
            ],
            Self::OrderDate => &["Order Date", "PO Date", "Date", "Tilauspäivä"],
            Self::BuyerName => &["Buyer Name", "Buyer", "Orderer", "Ordered By", "Tilaaja"],
            Self::CustomerName => &["Customer Name", "Customer", "Client", "Asiakas"],
            Self::ServiceDescription => &[
                "Service Description",
                "Description",
                "Service",
                "Item Description",
                "Palvelu",
            ],
            Self::InvoiceDate => &["Invoice Date", "Date", "Laskun päivä", "Laskupäivä"],
            Self::DueDate => &["Due Date", "Payment Due", "Eräpäivä"],
            Self::ApproverName => &["Approver Name", "Approver", "Approved By", "Hyväksyjä"],
            Self::PaymentStatus => &["Payment Status", "Status", "Paid", "Maksun tila"],
            Self::ProductName => &["Product Name", "Product", "Item", "Item Name", "Tuote"],
            Self::PriceListName => &["Price List Name", "Price List", "Hinnasto"],
            Self::PriceListSupplier => &[
                "Price List Supplier",
                "Supplier Name",
                "Supplier",
                "Vendor",
                "Toimittaja",
            ],
            Self::UnitPrice => &["Unit Price", "Price", "Hinta", "Yksikköhinta"],
        }
    }
}

/// Find the header a logical field maps to.
///
/// Exact matches across the whole alias list win over case-insensitive ones,
/// so a sheet holding both `Date` and `date` keeps its literal spelling.
pub fn resolve_column<'a>(field: LogicalField, headers: &[&'a str]) -> Option<&'a str> {
    let aliases = field.aliases();

    for alias in aliases {
        if let Some(header) = headers.iter().find(|header| **header == *alias) {
            return Some(*header);
        }
    }

    for alias in aliases {
        let wanted = alias.to_lowercase();
        if let Some(header) = headers.iter().find(|header| header.trim().to_lowercase() == wanted) {
            return Some(*header);
        }
    }

    None
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedField {
    pub field: &'static str,
    pub available_headers: Vec<String>,
}

/// Header resolution for one search, computed once from the first record.
#[derive(Clone, Debug, Default)]
pub struct ResolvedColumns {
    columns: HashMap<LogicalField, String>,
    unresolved: Vec<UnresolvedField>,
}

impl ResolvedColumns {
    pub fn resolve(fields: &[LogicalField], headers: &[&str]) -> Self {
        let mut resolved = Self::default();

        for field in fields {
            match resolve_column(*field, headers) {
                Some(column) => {
                    resolved.columns.insert(*field, column.to_string());
                }
                None => {
                    tracing::warn!(
                        event_name = "search.field_unresolved",
                        field = field.key(),
                        available_headers = ?headers,
                        "no header matches logical field; filter will be skipped"
                    );
                    resolved.unresolved.push(UnresolvedField {
                        field: field.key(),
                        available_headers: headers.iter().map(|h| h.to_string()).collect(),
                    });
                }
            }
        }

        resolved
    }

    pub fn column(&self, field: LogicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn unresolved(&self) -> &[UnresolvedField] {
        &self.unresolved
    }

    pub fn into_unresolved(self) -> Vec<UnresolvedField> {
        self.unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_column, LogicalField, ResolvedColumns};

    #[test]
    fn exact_alias_match_wins() {
        let headers = ["Order Number", "Supplier Name", "Supplier"];
        assert_eq!(resolve_column(LogicalField::SupplierName, &headers), Some("Supplier Name"));
    }

    #[test]
    fn case_insensitive_match_is_literal_only() {
        let headers = ["SUPPLIER NAME", "Amount"];
        assert_eq!(resolve_column(LogicalField::SupplierName, &headers), Some("SUPPLIER NAME"));

        let fuzzy = ["Supplier_Name", "Suppliers"];
        assert_eq!(resolve_column(LogicalField::SupplierName, &fuzzy), None);
    }

    #[test]
    fn exact_later_alias_beats_case_insensitive_earlier_alias() {
        let headers = ["supplier name", "Vendor"];
        assert_eq!(resolve_column(LogicalField::SupplierName, &headers), Some("Vendor"));
    }

    #[test]
    fn finnish_headers_resolve() {
        let headers = ["Toimittaja", "Tilauspäivä", "Tilaaja"];
        assert_eq!(resolve_column(LogicalField::SupplierName, &headers), Some("Toimittaja"));
        assert_eq!(resolve_column(LogicalField::OrderDate, &headers), Some("Tilauspäivä"));
        assert_eq!(resolve_column(LogicalField::BuyerName, &headers), Some("Tilaaja"));
    }

    #[test]
    fn unresolved_fields_carry_available_headers() {
        let headers = ["Supplier Name", "Amount"];
        let resolved = ResolvedColumns::resolve(
            &[LogicalField::SupplierName, LogicalField::BuyerName],
            &headers,
        );

        assert_eq!(resolved.column(LogicalField::SupplierName), Some("Supplier Name"));
        assert_eq!(resolved.column(LogicalField::BuyerName), None);
        assert_eq!(resolved.unresolved().len(), 1);
        assert_eq!(resolved.unresolved()[0].field, "buyerName");
        assert_eq!(resolved.unresolved()[0].available_headers, vec!["Supplier Name", "Amount"]);
    }
}
