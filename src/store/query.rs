//! Typed query building for the item-store's filtered reads.
//!
//! The store accepts Directus-style query params: a `filter` JSON object of
//! `{field: {_op: value}}` clauses plus `fields`, `sort`, `limit`, `offset`
//! and `meta`. Filters are built from explicit clauses instead of free-form
//! dictionaries so call sites stay checkable.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    pub fn key(self) -> &'static str {
        match self {
            Op::Eq => "_eq",
            Op::Gte => "_gte",
            Op::Lte => "_lte",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Eq, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Gte, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, Op::Lte, value.into())
    }

    fn push(mut self, field: &str, op: Op, value: Value) -> Self {
        self.clauses.push(Clause {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Render the Directus filter object, merging clauses on the same field
    /// (`sale_date` with both `_gte` and `_lte` becomes one range object).
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for clause in &self.clauses {
            let entry = root
                .entry(clause.field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(clause.op.key().to_string(), clause.value.clone());
            }
        }
        Value::Object(root)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub fields: Vec<String>,
    pub filter: Filter,
    pub sort: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub with_total: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: &[&str]) -> Self {
        self.sort = sort.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Ask the store to include a `total_count` in the response meta.
    pub fn with_total(mut self) -> Self {
        self.with_total = true;
        self
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.fields.is_empty() {
            params.push(("fields".to_string(), self.fields.join(",")));
        }
        if !self.filter.is_empty() {
            params.push(("filter".to_string(), self.filter.to_json().to_string()));
        }
        if !self.sort.is_empty() {
            params.push(("sort".to_string(), self.sort.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if self.with_total {
            params.push(("meta".to_string(), "total_count".to_string()));
        }
        params
    }
}
