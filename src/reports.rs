//! Daily and monthly sale rollups.
//!
//! Reporting is best-effort: a failed or unreachable store read yields a
//! zeroed report instead of an error, so a reporting hiccup can never block
//! the admin pages that render these numbers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::models::{Product, Sale};
use crate::store::query::{Filter, Query};
use crate::store::ItemStore;

const TOP_PRODUCT_LIMIT: usize = 10;

/// Field selection for report reads: sale scalars plus enough of each line's
/// product for ranking. Lines whose product the store did not expand cannot
/// be attributed and are skipped.
const SALE_REPORT_FIELDS: &[&str] = &[
    "id",
    "sale_date",
    "sale_type",
    "total_amount",
    "total_cost",
    "total_profit",
    "notes",
    "user_created",
    "date_created",
    "user_updated",
    "date_updated",
    "sale_items.id",
    "sale_items.quantity",
    "sale_items.unit_price",
    "sale_items.unit_cost",
    "sale_items.subtotal",
    "sale_items.product.id",
    "sale_items.product.name",
    "sale_items.product.slug",
    "sale_items.product.sku",
    "sale_items.product.price",
];

#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub sales_count: usize,
    pub total_amount: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    pub items: Vec<Sale>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub sales_count: usize,
    pub total_amount: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    pub items: Vec<Sale>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Serialize)]
pub struct TopProduct {
    pub product: Product,
    pub quantity: i64,
    pub revenue: f64,
}

#[derive(Clone)]
pub struct ReportEngine {
    store: Arc<dyn ItemStore>,
}

impl ReportEngine {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Rollup for one calendar day, both bounds inclusive.
    pub async fn daily(&self, date: NaiveDate) -> DailyReport {
        let filter = Filter::new()
            .gte("sale_date", format!("{date}T00:00:00"))
            .lte("sale_date", format!("{date}T23:59:59"));
        let sales = self.fetch_sales(filter).await;
        let (total_amount, total_cost) = sum_totals(&sales);
        DailyReport {
            date,
            sales_count: sales.len(),
            total_amount,
            total_cost,
            // Derived, never summed on its own, so the two representations
            // cannot drift apart.
            total_profit: total_amount - total_cost,
            items: sales,
        }
    }

    /// Rollup for one calendar month, with top products ranked by revenue.
    pub async fn monthly(&self, year: i32, month: u32) -> MonthlyReport {
        let window = NaiveDate::from_ymd_opt(year, month, 1).zip(month_end(year, month));
        let sales = match window {
            Some((start, end)) => {
                let filter = Filter::new()
                    .gte("sale_date", start.to_string())
                    .lte("sale_date", end.to_string());
                self.fetch_sales(filter).await
            }
            None => {
                warn!(year, month, "invalid report month requested");
                Vec::new()
            }
        };
        let (total_amount, total_cost) = sum_totals(&sales);
        let top_products = top_products(&sales);
        MonthlyReport {
            year,
            month,
            sales_count: sales.len(),
            total_amount,
            total_cost,
            total_profit: total_amount - total_cost,
            items: sales,
            top_products,
        }
    }

    async fn fetch_sales(&self, filter: Filter) -> Vec<Sale> {
        let query = Query::new()
            .fields(SALE_REPORT_FIELDS)
            .filter(filter)
            .sort(&["-sale_date", "-date_created"]);
        match self.store.list_sales(query).await {
            Ok(page) => page.data,
            Err(err) => {
                warn!(error = %err, "sales read failed, reporting an empty window");
                Vec::new()
            }
        }
    }
}

/// Last day of the month, computed rather than assumed to be the 31st.
fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

fn sum_totals(sales: &[Sale]) -> (f64, f64) {
    let amount = sales.iter().map(|s| money(s.total_amount)).sum();
    let cost = sales.iter().map(|s| money(s.total_cost)).sum();
    (money(amount), money(cost))
}

/// Numeric-safe reducer input: anything non-finite contributes zero.
fn money(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn top_products(sales: &[Sale]) -> Vec<TopProduct> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut ranked: Vec<TopProduct> = Vec::new();

    for sale in sales {
        for item in sale.sale_items.iter().flatten() {
            let Some(product) = item.product.expanded() else {
                continue;
            };
            match index.get(&product.id) {
                Some(&at) => {
                    ranked[at].quantity += item.quantity;
                    ranked[at].revenue += item.revenue();
                }
                None => {
                    index.insert(product.id.clone(), ranked.len());
                    ranked.push(TopProduct {
                        product: product.clone(),
                        quantity: item.quantity,
                        revenue: item.revenue(),
                    });
                }
            }
        }
    }

    // Stable sort keeps insertion order on revenue ties.
    ranked.sort_by(|a, b| b.revenue.partial_cmp(&a.revenue).unwrap_or(Ordering::Equal));
    ranked.truncate(TOP_PRODUCT_LIMIT);
    ranked
}
