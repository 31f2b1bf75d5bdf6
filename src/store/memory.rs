//! In-memory `ItemStore` used by the workflow, report, and handler tests.
//! Supports injecting per-operation write failures and full outages so the
//! bounded-retry and best-effort paths can be exercised.

use std::sync::Mutex;

use async_trait::async_trait;

use super::query::{Op, Query};
use super::{ItemStore, Page, StoreError};
use crate::models::{
    Category, CategoryInput, CategoryRef, Product, ProductInput, ProductPatch, ProductRef, Sale,
    SaleDraft, SaleItem, SaleItemDraft, SaleTotals, StockMovement, StockMovementDraft,
};

#[derive(Default)]
struct Inner {
    products: Vec<Product>,
    categories: Vec<Category>,
    sales: Vec<Sale>,
    sale_items: Vec<SaleItem>,
    movements: Vec<StockMovement>,
    next_id: u64,
    fail_total_updates: usize,
    fail_item_creates: usize,
    fail_stock_updates: usize,
    fail_movement_creates: usize,
    unreachable: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(
        &self,
        id: &str,
        name: &str,
        price: f64,
        cost_price: f64,
        discount_price: Option<f64>,
        stock_quantity: i64,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.products.push(Product {
            id: id.to_string(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            sku: format!("SKU-{id}"),
            description: None,
            price,
            discount_price,
            cost_price,
            stock_quantity,
            is_active: true,
            material: None,
            category: None,
            images: None,
            date_created: None,
            date_updated: None,
        });
    }

    /// Make the next `n` totals updates fail with a permission error.
    pub fn fail_next_total_updates(&self, n: usize) {
        self.inner.lock().unwrap().fail_total_updates = n;
    }

    /// Make the next `n` sale-item creates fail with a server error.
    pub fn fail_next_item_creates(&self, n: usize) {
        self.inner.lock().unwrap().fail_item_creates = n;
    }

    /// Make the next `n` stock updates fail with a server error.
    pub fn fail_next_stock_updates(&self, n: usize) {
        self.inner.lock().unwrap().fail_stock_updates = n;
    }

    /// Make the next `n` stock-movement creates fail with a server error.
    pub fn fail_next_movement_creates(&self, n: usize) {
        self.inner.lock().unwrap().fail_movement_creates = n;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        let inner = self.inner.lock().unwrap();
        inner.products.iter().find(|p| p.id == id).cloned()
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.inner.lock().unwrap().sales.clone()
    }

    pub fn sale_items(&self) -> Vec<SaleItem> {
        self.inner.lock().unwrap().sale_items.clone()
    }

    pub fn movements(&self) -> Vec<StockMovement> {
        self.inner.lock().unwrap().movements.clone()
    }

    fn check_reachable(inner: &Inner) -> Result<(), StoreError> {
        if inner.unreachable {
            Err(StoreError::Unreachable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn mint_id(inner: &mut Inner, prefix: &str) -> String {
        inner.next_id += 1;
        format!("{prefix}-{}", inner.next_id)
    }

    fn sale_with_items(inner: &Inner, sale: &Sale) -> Sale {
        let mut sale = sale.clone();
        let items: Vec<SaleItem> = inner
            .sale_items
            .iter()
            .filter(|item| item.sale.as_deref() == Some(sale.id.as_str()))
            .map(|item| {
                let mut item = item.clone();
                if let Some(product) = inner.products.iter().find(|p| p.id == item.product.id()) {
                    item.product = ProductRef::Full(Box::new(product.clone()));
                }
                item
            })
            .collect();
        sale.sale_items = Some(items);
        sale
    }
}

fn date_part(value: &str) -> &str {
    value.get(..10).unwrap_or(value)
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        Ok(inner.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self, query: Query) -> Result<Page<Product>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let mut data: Vec<Product> = inner.products.clone();
        for clause in query.filter.clauses() {
            if clause.op == Op::Eq && clause.field == "slug" {
                data.retain(|p| Some(p.slug.as_str()) == clause.value.as_str());
            }
        }
        let total = Some(data.len() as u64);
        Ok(Page { data, total })
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let id = Self::mint_id(&mut inner, "product");
        let product = Product {
            id: id.clone(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            sku: input.sku.clone(),
            description: input.description.clone(),
            price: input.price,
            discount_price: input.discount_price,
            cost_price: input.cost_price,
            stock_quantity: input.stock_quantity,
            is_active: input.is_active,
            material: input.material.clone(),
            category: input.category.clone().map(CategoryRef::Id),
            images: input.images.clone(),
            date_created: None,
            date_updated: None,
        };
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::Backend {
                status: 404,
                message: "product not found".to_string(),
            })?;
        if let Some(name) = &patch.name {
            product.name = name.clone();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(cost) = patch.cost_price {
            product.cost_price = cost;
        }
        if let Some(stock) = patch.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(active) = patch.is_active {
            product.is_active = active;
        }
        Ok(product.clone())
    }

    async fn find_category(&self, id: &str) -> Result<Option<Category>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        Ok(inner.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        Ok(inner.categories.clone())
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<Category, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let id = Self::mint_id(&mut inner, "category");
        let category = Category {
            id,
            name: input.name.clone(),
            slug: input.slug.clone(),
            image: input.image.clone(),
            date_created: None,
            date_updated: None,
        };
        inner.categories.push(category.clone());
        Ok(category)
    }

    async fn create_sale(&self, draft: &SaleDraft) -> Result<Sale, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let id = Self::mint_id(&mut inner, "sale");
        let sale = Sale {
            id,
            sale_date: draft.sale_date.clone(),
            sale_type: draft.sale_type,
            total_amount: 0.0,
            total_cost: 0.0,
            total_profit: 0.0,
            notes: draft.notes.clone(),
            sale_items: None,
            user_created: None,
            date_created: None,
            user_updated: None,
            date_updated: None,
        };
        inner.sales.push(sale.clone());
        Ok(sale)
    }

    async fn find_sale(&self, id: &str) -> Result<Option<Sale>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        Ok(inner.sales.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sales(&self, query: Query) -> Result<Page<Sale>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        let mut data: Vec<Sale> = inner.sales.clone();
        for clause in query.filter.clauses() {
            if clause.field != "sale_date" {
                continue;
            }
            let Some(bound) = clause.value.as_str().map(date_part) else {
                continue;
            };
            // The real store compares dates semantically. The report windows
            // always span whole days, so comparing date parts is equivalent.
            match clause.op {
                Op::Gte => data.retain(|s| date_part(&s.sale_date) >= bound),
                Op::Lte => data.retain(|s| date_part(&s.sale_date) <= bound),
                Op::Eq => data.retain(|s| date_part(&s.sale_date) == bound),
            }
        }
        let data: Vec<Sale> = data
            .iter()
            .map(|sale| Self::sale_with_items(&inner, sale))
            .collect();
        let total = Some(data.len() as u64);
        Ok(Page { data, total })
    }

    async fn update_sale_totals(&self, id: &str, totals: &SaleTotals) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        if inner.fail_total_updates > 0 {
            inner.fail_total_updates -= 1;
            return Err(StoreError::Backend {
                status: 403,
                message: "field \"total_amount\" is read-only".to_string(),
            });
        }
        let sale = inner
            .sales
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::Backend {
                status: 404,
                message: "sale not found".to_string(),
            })?;
        sale.total_amount = totals.total_amount;
        sale.total_cost = totals.total_cost;
        sale.total_profit = totals.total_profit;
        Ok(())
    }

    async fn create_sale_item(&self, draft: &SaleItemDraft) -> Result<SaleItem, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        if inner.fail_item_creates > 0 {
            inner.fail_item_creates -= 1;
            return Err(StoreError::Backend {
                status: 500,
                message: "sale item write failed".to_string(),
            });
        }
        let id = Self::mint_id(&mut inner, "item");
        let item = SaleItem {
            id,
            sale: Some(draft.sale.clone()),
            product: ProductRef::Id(draft.product.clone()),
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            unit_cost: draft.unit_cost,
            subtotal: Some(draft.quantity as f64 * draft.unit_price),
            cost_total: Some(draft.quantity as f64 * draft.unit_cost),
            profit: Some(draft.quantity as f64 * (draft.unit_price - draft.unit_cost)),
        };
        inner.sale_items.push(item.clone());
        Ok(item)
    }

    async fn update_product_stock(&self, id: &str, quantity: i64) -> Result<Product, StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_stock_updates > 0 {
                inner.fail_stock_updates -= 1;
                return Err(StoreError::Backend {
                    status: 500,
                    message: "stock update failed".to_string(),
                });
            }
        }
        let patch = ProductPatch {
            stock_quantity: Some(quantity),
            ..ProductPatch::default()
        };
        self.update_product(id, &patch).await
    }

    async fn create_stock_movement(
        &self,
        draft: &StockMovementDraft,
    ) -> Result<StockMovement, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        if inner.fail_movement_creates > 0 {
            inner.fail_movement_creates -= 1;
            return Err(StoreError::Backend {
                status: 500,
                message: "stock movement write failed".to_string(),
            });
        }
        let id = Self::mint_id(&mut inner, "movement");
        let movement = StockMovement {
            id,
            product: ProductRef::Id(draft.product.clone()),
            movement_type: draft.movement_type,
            quantity: draft.quantity,
            reason: Some(draft.reason.clone()),
            related_sale: draft.related_sale.clone(),
            notes: draft.notes.clone(),
            date_created: None,
        };
        inner.movements.push(movement.clone());
        Ok(movement)
    }

    async fn list_stock_movements(
        &self,
        product: Option<&str>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check_reachable(&inner)?;
        Ok(inner
            .movements
            .iter()
            .filter(|m| product.map_or(true, |p| m.product.id() == p))
            .cloned()
            .collect())
    }
}
