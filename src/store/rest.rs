//! `reqwest`-backed item-store client speaking the Directus REST dialect:
//! `GET/POST /items/{collection}`, `PATCH /items/{collection}/{id}`, with a
//! `{"data": ..., "meta": ...}` response envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::query::{Filter, Query};
use super::{ItemStore, Page, StoreError};
use crate::models::{
    Category, CategoryInput, Product, ProductInput, ProductPatch, Sale, SaleDraft, SaleItem,
    SaleItemDraft, SaleTotals, StockMovement, StockMovementDraft,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Scalar sale fields. Selecting `*` makes the store try to resolve alias
/// fields (reverse relations) as columns, which fails server-side, so every
/// sale read names its fields explicitly.
const SALE_FIELDS: &[&str] = &[
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
];

const PRODUCT_FIELDS: &[&str] = &["*", "category.id", "category.name", "category.slug"];

const CATEGORY_FIELDS: &[&str] = &["id", "name", "slug", "image", "date_created", "date_updated"];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: String,
}

pub struct RestItemStore {
    base: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl RestItemStore {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    fn items_url(&self, collection: &str) -> String {
        format!("{}/items/{}", self.base, collection)
    }

    fn item_url(&self, collection: &str, id: &str) -> String {
        format!("{}/items/{}/{}", self.base, collection, id)
    }

    fn prepare(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(REQUEST_TIMEOUT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_items<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Page<T>, StoreError> {
        let request = self
            .prepare(self.http.get(self.items_url(collection)))
            .query(&query.params());
        let response = request.send().await.map_err(transport)?;
        let envelope: Envelope<Vec<T>> = decode(response).await?;
        Ok(Page {
            data: envelope.data,
            total: envelope.meta.unwrap_or_default().total_count,
        })
    }

    async fn get_item<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        fields: &[&str],
    ) -> Result<Option<T>, StoreError> {
        let query = Query::new().fields(fields);
        let request = self
            .prepare(self.http.get(self.item_url(collection, id)))
            .query(&query.params());
        let response = request.send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: Envelope<T> = decode(response).await?;
        Ok(Some(envelope.data))
    }

    async fn post_item<T: DeserializeOwned, B: Serialize>(
        &self,
        collection: &str,
        body: &B,
        fields: &[&str],
    ) -> Result<T, StoreError> {
        let mut request = self.prepare(self.http.post(self.items_url(collection))).json(body);
        if !fields.is_empty() {
            let query = Query::new().fields(fields);
            request = request.query(&query.params());
        }
        let response = request.send().await.map_err(transport)?;
        let envelope: Envelope<T> = decode(response).await?;
        Ok(envelope.data)
    }

    async fn patch_item<T: DeserializeOwned, B: Serialize>(
        &self,
        collection: &str,
        id: &str,
        body: &B,
        fields: &[&str],
    ) -> Result<T, StoreError> {
        let mut request = self
            .prepare(self.http.patch(self.item_url(collection, id)))
            .json(body);
        if !fields.is_empty() {
            let query = Query::new().fields(fields);
            request = request.query(&query.params());
        }
        let response = request.send().await.map_err(transport)?;
        let envelope: Envelope<T> = decode(response).await?;
        Ok(envelope.data)
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Unreachable(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Backend {
            status: status.as_u16(),
            message: extract_message(&body),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| StoreError::Decode(err.to_string()))
}

fn extract_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(entry) = envelope.errors.into_iter().next() {
            if !entry.message.is_empty() {
                return entry.message;
            }
        }
    }
    let mut message = body.trim().to_string();
    message.truncate(200);
    message
}

#[async_trait]
impl ItemStore for RestItemStore {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.get_item("products", id, PRODUCT_FIELDS).await
    }

    async fn list_products(&self, query: Query) -> Result<Page<Product>, StoreError> {
        let query = if query.fields.is_empty() {
            query.fields(PRODUCT_FIELDS)
        } else {
            query
        };
        self.get_items("products", &query).await
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, StoreError> {
        self.post_item("products", input, PRODUCT_FIELDS).await
    }

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, StoreError> {
        self.patch_item("products", id, patch, PRODUCT_FIELDS).await
    }

    async fn find_category(&self, id: &str) -> Result<Option<Category>, StoreError> {
        self.get_item("categories", id, CATEGORY_FIELDS).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let query = Query::new().fields(CATEGORY_FIELDS).sort(&["-date_created"]);
        Ok(self.get_items("categories", &query).await?.data)
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<Category, StoreError> {
        self.post_item("categories", input, CATEGORY_FIELDS).await
    }

    async fn create_sale(&self, draft: &SaleDraft) -> Result<Sale, StoreError> {
        self.post_item("sales", draft, SALE_FIELDS).await
    }

    async fn find_sale(&self, id: &str) -> Result<Option<Sale>, StoreError> {
        self.get_item("sales", id, SALE_FIELDS).await
    }

    async fn list_sales(&self, query: Query) -> Result<Page<Sale>, StoreError> {
        let query = if query.fields.is_empty() {
            query.fields(SALE_FIELDS)
        } else {
            query
        };
        self.get_items("sales", &query).await
    }

    async fn update_sale_totals(&self, id: &str, totals: &SaleTotals) -> Result<(), StoreError> {
        // No field selection here: asking the store to return the updated
        // record makes it select alias fields and fail even when the write
        // itself succeeded. Status code is the only signal we trust.
        let request = self
            .prepare(self.http.patch(self.item_url("sales", id)))
            .json(totals);
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }
        Ok(())
    }

    async fn create_sale_item(&self, draft: &SaleItemDraft) -> Result<SaleItem, StoreError> {
        self.post_item("sale_items", draft, &[]).await
    }

    async fn update_product_stock(&self, id: &str, quantity: i64) -> Result<Product, StoreError> {
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
        self.post_item("stock_movements", draft, &[]).await
    }

    async fn list_stock_movements(
        &self,
        product: Option<&str>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let mut filter = Filter::new();
        if let Some(product) = product {
            filter = filter.eq("product", product);
        }
        let query = Query::new().filter(filter).sort(&["-date_created"]);
        Ok(self.get_items("stock_movements", &query).await?.data)
    }
}
