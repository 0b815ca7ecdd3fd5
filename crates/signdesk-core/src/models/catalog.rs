/// A sign offered for purchase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogItem {
    pub id: u32,
    pub name: &'static str,
    pub price: f64,
    pub category: &'static str,
}

pub const CATALOG: &[CatalogItem] = &[
    CatalogItem { id: 1, name: "Exit Sign", price: 89.99, category: "Safety" },
    CatalogItem { id: 2, name: "No Smoking Sign", price: 24.99, category: "Regulatory" },
    CatalogItem { id: 3, name: "Restroom Sign", price: 19.99, category: "Directional" },
    CatalogItem { id: 4, name: "Emergency Exit Sign", price: 99.99, category: "Safety" },
    CatalogItem { id: 5, name: "Handicap Access Sign", price: 29.99, category: "Accessibility" },
];

impl CatalogItem {
    pub fn find(id: u32) -> Option<&'static CatalogItem> {
        CATALOG.iter().find(|item| item.id == id)
    }

    pub fn display_price(&self) -> String {
        format!("${:.2}", self.price)
    }
}
