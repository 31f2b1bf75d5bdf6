//! Sale recording workflow.
//!
//! Records a multi-line sale against the item-store: validates stock up
//! front, creates the sale header and lines, writes locally computed totals
//! back with bounded retries, then decrements stock and appends the audit
//! trail per line. Everything before the header commit is all-or-nothing;
//! everything after is best-effort and only ever logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use validator::Validate;

use crate::models::{
    MovementType, Product, Sale, SaleDraft, SaleItemDraft, SaleTotals, SaleType,
    StockMovementDraft,
};
use crate::store::{ItemStore, StoreError};

/// Tolerance when comparing persisted monetary totals to computed ones.
pub const CURRENCY_EPSILON: f64 = 0.01;

/// Pause before retrying a rejected totals write, giving the store's own
/// recomputation hook a chance to run first.
const TOTALS_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize, Validate)]
pub struct RecordSaleRequest {
    pub sale_date: NaiveDate,
    pub sale_type: SaleType,
    #[serde(default)]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LineRequest {
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Error)]
pub enum SaleError {
    #[error("Ürün bulunamadı: {0}")]
    ProductNotFound(String),

    #[error("Yetersiz stok: {name} (Mevcut: {available}, İstenen: {requested})")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    #[error("invalid quantity {quantity} for product {product}")]
    InvalidQuantity { product: String, quantity: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SaleRecorder {
    store: Arc<dyn ItemStore>,
}

impl SaleRecorder {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Record a sale end to end. On success the returned sale always carries
    /// the locally computed totals, whether or not the store accepted them.
    pub async fn record(&self, request: &RecordSaleRequest) -> Result<Sale, SaleError> {
        let lines = self.validate_lines(&request.items).await?;

        let sale = self
            .store
            .create_sale(&SaleDraft {
                sale_date: request.sale_date.to_string(),
                sale_type: request.sale_type,
                notes: request.notes.clone(),
            })
            .await?;

        let totals = self.materialize_lines(&sale.id, &lines).await;
        self.persist_totals(&sale.id, &totals).await;
        self.decrement_stock_and_audit(&sale, request.sale_type, &lines)
            .await;
        Ok(self.reconcile(sale, &totals).await)
    }

    /// Pre-validation pass: resolve every product and check stock before any
    /// write, so a shortfall can never leave a half-created sale behind.
    async fn validate_lines(
        &self,
        items: &[LineRequest],
    ) -> Result<Vec<(Product, i64)>, SaleError> {
        let mut lines = Vec::with_capacity(items.len());
        for line in items {
            if line.quantity < 1 {
                return Err(SaleError::InvalidQuantity {
                    product: line.product.clone(),
                    quantity: line.quantity,
                });
            }
            let product = self
                .store
                .find_product(&line.product)
                .await?
                .ok_or_else(|| SaleError::ProductNotFound(line.product.clone()))?;
            if product.stock_quantity < line.quantity {
                return Err(SaleError::InsufficientStock {
                    name: product.name,
                    available: product.stock_quantity,
                    requested: line.quantity,
                });
            }
            lines.push((product, line.quantity));
        }
        Ok(lines)
    }

    /// Create the sale items, capturing prices at current product state, and
    /// compute the totals locally. The sale is already committed, so a
    /// failed line write is logged rather than raised.
    async fn materialize_lines(&self, sale_id: &str, lines: &[(Product, i64)]) -> SaleTotals {
        let mut total_amount = 0.0;
        let mut total_cost = 0.0;
        for (product, quantity) in lines {
            let unit_price = product.effective_price();
            let unit_cost = product.cost_price;
            total_amount += *quantity as f64 * unit_price;
            total_cost += *quantity as f64 * unit_cost;

            let draft = SaleItemDraft {
                sale: sale_id.to_string(),
                product: product.id.clone(),
                quantity: *quantity,
                unit_price,
                unit_cost,
            };
            if let Err(err) = self.store.create_sale_item(&draft).await {
                warn!(sale = %sale_id, product = %product.id, error = %err,
                    "sale item write failed after sale commit");
            }
        }
        SaleTotals {
            total_amount,
            total_cost,
            total_profit: total_amount - total_cost,
        }
    }

    /// Write computed totals onto the header: one retry after a short delay,
    /// then fall back to the store's own asynchronous recomputation.
    async fn persist_totals(&self, sale_id: &str, totals: &SaleTotals) {
        if let Err(first) = self.store.update_sale_totals(sale_id, totals).await {
            warn!(sale = %sale_id, error = %first, "totals update rejected, retrying");
            tokio::time::sleep(TOTALS_RETRY_DELAY).await;
            if let Err(second) = self.store.update_sale_totals(sale_id, totals).await {
                warn!(sale = %sale_id, error = %second,
                    "totals update failed twice, leaving them to the store's recomputation");
            }
        }
    }

    /// Per-line stock decrement and audit trail. The sale stands regardless:
    /// a failed decrement or movement write is logged and skipped so one bad
    /// line cannot lose the whole sale.
    async fn decrement_stock_and_audit(
        &self,
        sale: &Sale,
        sale_type: SaleType,
        lines: &[(Product, i64)],
    ) {
        let channel_note = match sale_type {
            SaleType::Online => "Online satış",
            SaleType::Counter => "Tezgah satış",
        };
        for (product, quantity) in lines {
            let current = match self.store.find_product(&product.id).await {
                Ok(Some(current)) => current,
                Ok(None) => {
                    warn!(sale = %sale.id, product = %product.id,
                        "product vanished before stock decrement");
                    continue;
                }
                Err(err) => {
                    warn!(sale = %sale.id, product = %product.id, error = %err,
                        "product re-read failed before stock decrement");
                    continue;
                }
            };

            let new_quantity = current.stock_quantity - quantity;
            if let Err(err) = self.store.update_product_stock(&product.id, new_quantity).await {
                warn!(sale = %sale.id, product = %product.id, error = %err,
                    "stock decrement failed after sale commit");
            }

            let movement = StockMovementDraft {
                product: product.id.clone(),
                movement_type: MovementType::Out,
                quantity: -quantity,
                reason: "Satış".to_string(),
                related_sale: Some(sale.id.clone()),
                notes: Some(channel_note.to_string()),
            };
            if let Err(err) = self.store.create_stock_movement(&movement).await {
                warn!(sale = %sale.id, product = %product.id, error = %err,
                    "stock movement write failed after sale commit");
            }
        }
    }

    /// Read the sale back and retry the totals write once more if what was
    /// persisted disagrees with what we computed. The response carries the
    /// computed values either way; a write failure must never surface a
    /// wrong total to the caller.
    async fn reconcile(&self, sale: Sale, totals: &SaleTotals) -> Sale {
        let mut recorded = match self.store.find_sale(&sale.id).await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                warn!(sale = %sale.id, "created sale missing on read-back");
                sale
            }
            Err(err) => {
                warn!(sale = %sale.id, error = %err, "sale read-back failed");
                sale
            }
        };

        if !totals_match(&recorded, totals) {
            warn!(sale = %recorded.id,
                persisted_amount = recorded.total_amount,
                computed_amount = totals.total_amount,
                "persisted totals disagree with computed totals, retrying update");
            if let Err(err) = self.store.update_sale_totals(&recorded.id, totals).await {
                warn!(sale = %recorded.id, error = %err, "reconciliation totals update failed");
            }
        }

        recorded.total_amount = totals.total_amount;
        recorded.total_cost = totals.total_cost;
        recorded.total_profit = totals.total_profit;
        recorded
    }
}

fn totals_match(sale: &Sale, totals: &SaleTotals) -> bool {
    (sale.total_amount - totals.total_amount).abs() <= CURRENCY_EPSILON
        && (sale.total_cost - totals.total_cost).abs() <= CURRENCY_EPSILON
        && (sale.total_profit - totals.total_profit).abs() <= CURRENCY_EPSILON
}
