use anyhow::Result;
use async_trait::async_trait;

use signdesk_core::api::ApiClient;
use signdesk_core::models::{Purchase, PurchaseStatus, CATALOG};
use signdesk_core::{AuthorizedSession, RouteRequest, View};

use crate::utils::{format_optional_date, format_price, table, truncate_string};

const ITEMS_WIDTH: usize = 36;

/// `/dashboard/purchases`: every order for admins, own orders for users.
pub struct PurchasesPage {
    api: ApiClient,
}

impl PurchasesPage {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl View for PurchasesPage {
    fn title(&self) -> &str {
        "Purchases"
    }

    async fn render(&self, session: &AuthorizedSession, _request: &RouteRequest) -> Result<String> {
        let api = self.api.with_token(session.token.clone());
        let purchases = if session.is_admin() {
            api.fetch_all_purchases().await?
        } else {
            api.fetch_my_purchases().await?
        };
        Ok(render_purchases(&purchases, session.is_admin()))
    }
}

pub fn render_purchases(purchases: &[Purchase], show_customer: bool) -> String {
    if purchases.is_empty() {
        return "No purchases yet.".to_string();
    }

    let mut headers = vec!["Order", "ID", "Items", "Total", "Status", "Date"];
    if show_customer {
        headers.insert(2, "Customer");
    }

    let rows: Vec<Vec<String>> = purchases
        .iter()
        .map(|p| {
            let mut row = vec![
                p.order_number.clone().unwrap_or_else(|| "-".to_string()),
                p.id.clone().unwrap_or_else(|| "-".to_string()),
                truncate_string(&p.items_display(), ITEMS_WIDTH),
                format_price(p.total()),
                p.status.to_string(),
                format_optional_date(p.date()),
            ];
            if show_customer {
                let customer = p
                    .user
                    .as_ref()
                    .map(|u| u.display_name())
                    .unwrap_or_else(|| "-".to_string());
                row.insert(2, customer);
            }
            row
        })
        .collect();

    let mut out = table(&headers, &rows);
    if show_customer {
        let statuses: Vec<&str> = PurchaseStatus::SETTABLE.iter().map(|s| s.as_str()).collect();
        out.push_str(&format!("\n\nStatuses: {}", statuses.join(", ")));
    }
    out
}

/// The sign catalog, shown without signing in.
pub fn render_catalog() -> String {
    let rows: Vec<Vec<String>> = CATALOG
        .iter()
        .map(|item| {
            vec![
                item.id.to_string(),
                item.name.to_string(),
                item.category.to_string(),
                item.display_price(),
            ]
        })
        .collect();
    table(&["#", "Sign", "Category", "Price"], &rows)
}
