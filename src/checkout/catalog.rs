//! Product catalog
//!
//! The only trusted source of product names and prices at checkout.

use std::{
    fmt,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{money::Price, storage::RepositoryError};

/// Catalog product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wrap a product identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Authoritative product details.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,

    /// Unit price in the base currency.
    pub unit_price: Price,

    /// The catalog already discounts this product.
    pub on_promotion: bool,
}

#[automock]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product; `None` if it does not exist or was removed.
    async fn get_product(&self, id: ProductId) -> Result<Option<CatalogProduct>, RepositoryError>;
}

/// Catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<FxHashMap<ProductId, CatalogProduct>>,
}

impl InMemoryCatalog {
    /// Create a catalog with the given products.
    pub fn new(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        Self {
            products: RwLock::new(
                products
                    .into_iter()
                    .map(|product| (product.id.clone(), product))
                    .collect(),
            ),
        }
    }

    /// Add or replace a product.
    pub fn insert(&self, product: CatalogProduct) {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id.clone(), product);
    }

    /// Remove a product, as when it is deleted from the shop.
    pub fn remove(&self, id: &ProductId) -> Option<CatalogProduct> {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Option<CatalogProduct>, RepositoryError> {
        Ok(self
            .products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}
