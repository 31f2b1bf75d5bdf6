//! Atelier Commerce
//!
//! Jewelry storefront and admin back-office API over a headless item-store.
//!
//! ## Features
//! - Product catalog and category management
//! - Counter and online sale recording with stock decrement and audit trail
//! - Daily and monthly profit reports with top-product ranking
//! - Typed access facade over the external item-store's REST API

pub mod api;
pub mod config;
pub mod models;
pub mod reports;
pub mod sales;
pub mod store;
