//! Item-store access facade.
//!
//! All durable state lives in an external headless item-store reached over
//! HTTP. This module defines the typed operations the rest of the crate is
//! allowed to perform against it, plus the `reqwest`-backed implementation.
//! Failure policy lives at the call sites: the facade reports every error and
//! never substitutes defaults on its own.

pub mod query;
pub mod rest;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    Category, CategoryInput, Product, ProductInput, ProductPatch, Sale, SaleDraft, SaleItem,
    SaleItemDraft, SaleTotals, StockMovement, StockMovementDraft,
};
use query::Query;

pub use rest::RestItemStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("item-store request failed ({status}): {message}")]
    Backend { status: u16, message: String },

    /// The store could not be reached at all (connect/timeout/DNS).
    #[error("item-store unreachable: {0}")]
    Unreachable(String),

    /// The store answered but the body did not match the expected shape.
    #[error("unexpected item-store response: {0}")]
    Decode(String),
}

/// One page of a filtered read, with the total count when requested.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError>;
    async fn list_products(&self, query: Query) -> Result<Page<Product>, StoreError>;
    async fn create_product(&self, input: &ProductInput) -> Result<Product, StoreError>;
    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, StoreError>;

    async fn find_category(&self, id: &str) -> Result<Option<Category>, StoreError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn create_category(&self, input: &CategoryInput) -> Result<Category, StoreError>;

    async fn create_sale(&self, draft: &SaleDraft) -> Result<Sale, StoreError>;
    async fn find_sale(&self, id: &str) -> Result<Option<Sale>, StoreError>;
    async fn list_sales(&self, query: Query) -> Result<Page<Sale>, StoreError>;

    /// Write the computed totals onto a sale header. Sent as plain JSON
    /// numbers with no response field selection; the store treats these
    /// columns as computed in some deployments and may reject the write.
    async fn update_sale_totals(&self, id: &str, totals: &SaleTotals) -> Result<(), StoreError>;

    async fn create_sale_item(&self, draft: &SaleItemDraft) -> Result<SaleItem, StoreError>;

    async fn update_product_stock(&self, id: &str, quantity: i64) -> Result<Product, StoreError>;
    async fn create_stock_movement(
        &self,
        draft: &StockMovementDraft,
    ) -> Result<StockMovement, StoreError>;
    async fn list_stock_movements(
        &self,
        product: Option<&str>,
    ) -> Result<Vec<StockMovement>, StoreError>;
}
