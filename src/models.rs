//! Wire types for the item-store collections.
//!
//! The store is loosely typed: decimal columns come back as JSON numbers,
//! numeric strings, or null depending on how a record was written. Every
//! monetary and count field therefore passes through a coercing deserializer
//! that defaults to zero instead of failing the whole record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Numeric coercion
// =============================================================================

fn coerce_money(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn de_money<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.as_ref().map(coerce_money).unwrap_or(0.0))
}

fn de_money_opt<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_money(&v)),
    })
}

fn de_count<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(value.as_ref().map(|v| coerce_money(v) as i64).unwrap_or(0))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

/// A relational reference that the store returns either expanded or as a
/// bare id, depending on the requested field list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(String),
    Full(Box<Category>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_money")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_money_opt")]
    pub discount_price: Option<f64>,
    /// Internal margin input. Only the admin API ever sees this.
    #[serde(default, deserialize_with = "de_money")]
    pub cost_price: f64,
    #[serde(default, deserialize_with = "de_count")]
    pub stock_quantity: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

impl Product {
    /// Price a customer actually pays: the discount price when it is set and
    /// genuinely below the list price, otherwise the list price.
    pub fn effective_price(&self) -> f64 {
        match self.discount_price {
            Some(d) if d > 0.0 && d < self.price => d,
            _ => self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub sku: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<f64>,
    #[serde(default)]
    pub cost_price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

fn default_active() -> bool {
    true
}

/// Partial product update; absent fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    Online,
    Counter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub sale_date: String,
    pub sale_type: SaleType,
    #[serde(default, deserialize_with = "de_money")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "de_money")]
    pub total_cost: f64,
    #[serde(default, deserialize_with = "de_money")]
    pub total_profit: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_items: Option<Vec<SaleItem>>,
    #[serde(default)]
    pub user_created: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub user_updated: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

/// Product reference on a sale line: a bare id unless the query expanded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(String),
    Full(Box<Product>),
}

impl ProductRef {
    pub fn id(&self) -> &str {
        match self {
            ProductRef::Id(id) => id,
            ProductRef::Full(p) => &p.id,
        }
    }

    pub fn expanded(&self) -> Option<&Product> {
        match self {
            ProductRef::Id(_) => None,
            ProductRef::Full(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: String,
    #[serde(default)]
    pub sale: Option<String>,
    pub product: ProductRef,
    #[serde(default, deserialize_with = "de_count")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "de_money")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "de_money")]
    pub unit_cost: f64,
    #[serde(default, deserialize_with = "de_money_opt")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "de_money_opt")]
    pub cost_total: Option<f64>,
    #[serde(default, deserialize_with = "de_money_opt")]
    pub profit: Option<f64>,
}

impl SaleItem {
    /// Line revenue: the store's computed subtotal when present, otherwise
    /// recomputed from the captured unit price.
    pub fn revenue(&self) -> f64 {
        self.subtotal
            .unwrap_or(self.quantity as f64 * self.unit_price)
    }
}

// =============================================================================
// Outbound drafts
// =============================================================================

/// Sale header as sent to the store. Totals are deliberately absent: they are
/// computed from the lines afterwards and written in a separate update.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDraft {
    pub sale_date: String,
    pub sale_type: SaleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleItemDraft {
    pub sale: String,
    pub product: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SaleTotals {
    pub total_amount: f64,
    pub total_cost: f64,
    pub total_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockMovementDraft {
    pub product: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_sale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: String,
    pub product: ProductRef,
    pub movement_type: MovementType,
    #[serde(default, deserialize_with = "de_count")]
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub related_sale: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
}
