use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CatalogItem, PersonRef, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Cancelled,
    Other(String),
}

impl PurchaseStatus {
    pub const SETTABLE: [PurchaseStatus; 3] = [
        PurchaseStatus::Pending,
        PurchaseStatus::Completed,
        PurchaseStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Cancelled => "cancelled",
            PurchaseStatus::Other(s) => s,
        }
    }
}

impl From<String> for PurchaseStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pending" => PurchaseStatus::Pending,
            "completed" => PurchaseStatus::Completed,
            "cancelled" => PurchaseStatus::Cancelled,
            _ => PurchaseStatus::Other(value),
        }
    }
}

impl From<PurchaseStatus> for String {
    fn from(status: PurchaseStatus) -> Self {
        status.as_str().to_string()
    }
}

impl FromStr for PurchaseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match PurchaseStatus::from(s.trim().to_string()) {
            PurchaseStatus::Other(_) => Err(ValidationError::UnknownPurchaseStatus(s.to_string())),
            status => Ok(status),
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "itemName", default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl PurchaseItem {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.item_name.as_deref())
            .unwrap_or("Unknown Item")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "orderNumber", default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub items: Vec<PurchaseItem>,
    #[serde(default = "default_status")]
    pub status: PurchaseStatus,
    #[serde(rename = "totalAmount", default)]
    pub total_amount: Option<f64>,
    /// Older records carry `total` instead of `totalAmount`.
    #[serde(rename = "total", default)]
    pub legacy_total: Option<f64>,
    #[serde(default)]
    pub user: Option<PersonRef>,
    #[serde(rename = "purchaseDate", default)]
    pub purchase_date: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

fn default_status() -> PurchaseStatus {
    PurchaseStatus::Pending
}

impl Purchase {
    /// Order number, falling back to the record id.
    pub fn reference(&self) -> &str {
        self.order_number
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("-")
    }

    pub fn date(&self) -> Option<&str> {
        self.purchase_date.as_deref().or(self.created_at.as_deref())
    }

    pub fn items_display(&self) -> String {
        if self.items.is_empty() {
            return "No items".to_string();
        }
        self.items
            .iter()
            .map(|i| i.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Total as reported by the backend, or summed from the line items.
    pub fn total(&self) -> f64 {
        self.total_amount.or(self.legacy_total).unwrap_or_else(|| {
            self.items
                .iter()
                .map(|i| i.price.unwrap_or(0.0) * f64::from(i.quantity.unwrap_or(1)))
                .sum()
        })
    }
}

/// Payload for `POST /api/purchases`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPurchase {
    pub items: Vec<NewPurchaseItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPurchaseItem {
    #[serde(rename = "itemName")]
    pub item_name: String,
    pub price: f64,
    pub quantity: u32,
}

impl NewPurchase {
    /// Build an order from `(catalog id, quantity)` pairs.
    pub fn from_catalog(lines: &[(u32, u32)]) -> Result<Self, ValidationError> {
        if lines.is_empty() {
            return Err(ValidationError::Empty("Order"));
        }
        let items = lines
            .iter()
            .map(|&(id, quantity)| {
                let item = CatalogItem::find(id).ok_or(ValidationError::UnknownCatalogItem(id))?;
                Ok(NewPurchaseItem {
                    item_name: item.name.to_string(),
                    price: item.price,
                    quantity: quantity.max(1),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_purchase_with_item_name_alias() {
        let purchase: Purchase = serde_json::from_value(json!({
            "_id": "p1",
            "items": [{"itemName": "Exit Sign", "price": 89.99, "quantity": 2}, {"price": 1.0}],
            "status": "completed"
        }))
        .unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Completed);
        assert_eq!(purchase.items_display(), "Exit Sign, Unknown Item");
        assert!((purchase.total() - 180.98).abs() < 1e-9);
    }

    #[test]
    fn test_parse_purchase_with_both_field_spellings() {
        let purchase: Purchase = serde_json::from_value(json!({
            "_id": "p2",
            "orderNumber": "ORD-1042",
            "items": [{"name": "Exit Sign", "itemName": "EXIT-01", "price": 89.99}],
            "status": "pending",
            "totalAmount": 89.99,
            "total": 80.0,
            "purchaseDate": "2025-04-01T10:00:00Z",
            "createdAt": "2025-03-30T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(purchase.items_display(), "Exit Sign");
        assert_eq!(purchase.date(), Some("2025-04-01T10:00:00Z"));
        assert!((purchase.total() - 89.99).abs() < 1e-9);
        assert_eq!(purchase.reference(), "ORD-1042");
    }

    #[test]
    fn test_fallbacks_when_preferred_fields_missing() {
        let purchase: Purchase = serde_json::from_value(json!({
            "_id": "p3",
            "items": [],
            "total": 12.5,
            "createdAt": "2025-03-30T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(purchase.date(), Some("2025-03-30T08:00:00Z"));
        assert!((purchase.total() - 12.5).abs() < 1e-9);
        assert_eq!(purchase.reference(), "p3");
    }

    #[test]
    fn test_status_display_capitalized() {
        assert_eq!(PurchaseStatus::Cancelled.to_string(), "Cancelled");
        assert_eq!(PurchaseStatus::from("shipped".to_string()).to_string(), "Shipped");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Completed".parse::<PurchaseStatus>().unwrap(), PurchaseStatus::Completed);
        assert!("shipped".parse::<PurchaseStatus>().is_err());
    }

    #[test]
    fn test_new_purchase_from_catalog() {
        let order = NewPurchase::from_catalog(&[(1, 2), (3, 0)]).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].item_name, "Exit Sign");
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[1].quantity, 1);

        assert_eq!(
            NewPurchase::from_catalog(&[(42, 1)]),
            Err(ValidationError::UnknownCatalogItem(42))
        );
        assert_eq!(NewPurchase::from_catalog(&[]), Err(ValidationError::Empty("Order")));
    }
}
