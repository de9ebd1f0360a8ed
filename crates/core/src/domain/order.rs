use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments of a purchase-order creation request as sent by the model.
///
/// Rows stay as raw JSON so one malformed row can be rejected on its own
/// without failing the whole request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub supplier_name: String,
    pub buyer_name: String,
    pub order_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_by_date: Option<String>,
    pub rows: Vec<Value>,
}

impl CreateOrderRequest {
    /// Names of required header fields that are blank.
    pub fn missing_header_fields(&self) -> Vec<&'static str> {
        [
            ("orderNumber", &self.order_number),
            ("supplierName", &self.supplier_name),
            ("buyerName", &self.buyer_name),
            ("orderDate", &self.order_date),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub row_index: usize,
    pub product_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    /// `quantity × unit_price`, checked when the row is validated.
    pub total: Decimal,
}

impl OrderRow {
    /// Validate one raw row. `row_index` is 1-based in the persisted record id.
    pub fn from_value(row_index: usize, value: &Value) -> Result<Self, RowRejection> {
        let reject = |reason: &str| RowRejection { row_index, reason: reason.to_string() };

        let object = value.as_object().ok_or_else(|| reject("row must be an object"))?;
        let description = text_field(object, &["description", "productDescription", "productName"])
            .ok_or_else(|| reject("description is required"))?;
        let quantity = object
            .get("quantity")
            .and_then(decimal_from_value)
            .ok_or_else(|| reject("quantity must be a number"))?;
        if quantity <= Decimal::ZERO {
            return Err(reject("quantity must be greater than zero"));
        }
        let unit_price = object
            .get("unitPrice")
            .and_then(decimal_from_value)
            .ok_or_else(|| reject("unitPrice must be a number"))?;
        if unit_price < Decimal::ZERO {
            return Err(reject("unitPrice must not be negative"));
        }
        let total =
            quantity.checked_mul(unit_price).ok_or_else(|| reject("line total out of range"))?;

        Ok(Self {
            row_index,
            product_code: text_field(object, &["productCode", "code"]),
            description,
            quantity,
            unit: text_field(object, &["unit"]),
            unit_price,
            total,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    pub row_index: usize,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderOutcome {
    pub success: bool,
    pub rows_added: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_rows: Vec<RowRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CreateOrderOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows_added: 0,
            total_value: Decimal::ZERO,
            artifact_handle: None,
            rejected_rows: Vec::new(),
            message: Some(message.into()),
        }
    }
}

fn text_field(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .ok()
            .or_else(|| number.as_f64().and_then(|n| Decimal::try_from(n).ok())),
        Value::String(text) => {
            let normalized = text.trim().replace(',', ".");
            Decimal::from_str(&normalized).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{CreateOrderRequest, OrderRow};

    #[test]
    fn row_totals_multiply_quantity_and_price() {
        let row = OrderRow::from_value(1, &json!({ "description": "Oil filter", "quantity": 3, "unitPrice": 10 }))
            .expect("valid row");
        assert_eq!(row.total, Decimal::from(30));
    }

    #[test]
    fn rows_accept_string_numbers_with_decimal_comma() {
        let row = OrderRow::from_value(
            2,
            &json!({ "description": "Hydraulic hose", "quantity": "2", "unitPrice": "12,50" }),
        )
        .expect("valid row");
        assert_eq!(row.total, Decimal::from(25));
    }

    #[test]
    fn malformed_rows_are_rejected_with_reason() {
        let missing_description = OrderRow::from_value(1, &json!({ "quantity": 1, "unitPrice": 5 }))
            .expect_err("no description");
        assert_eq!(missing_description.reason, "description is required");

        let zero_quantity =
            OrderRow::from_value(2, &json!({ "description": "Belt", "quantity": 0, "unitPrice": 5 }))
                .expect_err("zero quantity");
        assert_eq!(zero_quantity.row_index, 2);

        let negative_price =
            OrderRow::from_value(3, &json!({ "description": "Belt", "quantity": 1, "unitPrice": -1 }))
                .expect_err("negative price");
        assert!(negative_price.reason.contains("unitPrice"));
    }

    #[test]
    fn overflowing_line_totals_are_rejected() {
        let rejection = OrderRow::from_value(
            4,
            &json!({ "description": "huge", "quantity": "79228162514264337593543950335", "unitPrice": 2 }),
        )
        .expect_err("overflow");
        assert_eq!(rejection.row_index, 4);
        assert_eq!(rejection.reason, "line total out of range");
    }

    #[test]
    fn missing_header_fields_are_reported_by_argument_name() {
        let request: CreateOrderRequest =
            serde_json::from_value(json!({ "orderNumber": "PO-1", "rows": [] })).expect("request");
        assert_eq!(request.missing_header_fields(), vec!["supplierName", "buyerName", "orderDate"]);
    }
}
