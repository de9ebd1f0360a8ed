use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Filters accepted by the purchase-order search. Every field is optional and
/// an absent (or blank) field places no constraint on the result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseOrderCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
}

impl PurchaseOrderCriteria {
    pub fn is_empty(&self) -> bool {
        [
            &self.supplier_name,
            &self.product_description,
            &self.date_from,
            &self.date_to,
            &self.buyer_name,
        ]
        .into_iter()
        .all(|value| present(value).is_none())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

impl InvoiceCriteria {
    pub fn is_empty(&self) -> bool {
        [
            &self.customer_name,
            &self.service_description,
            &self.invoice_date_from,
            &self.invoice_date_to,
            &self.due_date_from,
            &self.due_date_to,
            &self.approver_name,
            &self.payment_status,
        ]
        .into_iter()
        .all(|value| present(value).is_none())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceListCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_list_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_list_supplier: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_count"
    )]
    pub limit: Option<usize>,
}

impl PriceListCriteria {
    /// `limit` alone does not count as a filter.
    pub fn has_filters(&self) -> bool {
        [&self.product_name, &self.price_list_name, &self.price_list_supplier]
            .into_iter()
            .any(|value| present(value).is_some())
    }
}

/// Trimmed, non-blank view of an optional criterion.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Models send counts as integers, floats (`10.0`) or strings; accept all three.
fn deserialize_optional_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let count = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n.floor() as u64)),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok().filter(|n| *n >= 0.0).map(|n| n as u64),
        Some(other) => {
            return Err(serde::de::Error::custom(format!("invalid limit value: {other}")));
        }
    };
    Ok(count.map(|count| count as usize))
}
