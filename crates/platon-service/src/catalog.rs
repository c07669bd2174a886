// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic keyed catalog with create/update/delete/get/list, shared by the
//! pipeline and policy catalogs.

use std::collections::HashMap;

use platon_error::{ErrorCode, PlatonError};
use tokio::sync::RwLock;

/// A reader/writer-locked map keyed by a string id, with catalog semantics
/// (duplicate-on-create, not-found-on-miss) shared between pipelines and
/// policies.
pub struct Catalog<T> {
    items: RwLock<HashMap<String, T>>,
}

impl<T: Clone + Send + Sync> Catalog<T> {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `item` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::DuplicateEntry`] if `id` is already present.
    pub async fn create(&self, id: impl Into<String>, item: T) -> Result<(), PlatonError> {
        let id = id.into();
        let mut guard = self.items.write().await;
        if guard.contains_key(&id) {
            return Err(PlatonError::new(ErrorCode::DuplicateEntry, format!("'{id}' already exists"))
                .with_detail("id", &id));
        }
        guard.insert(id, item);
        Ok(())
    }

    /// Replace the item at `id` via `f`, which receives the current value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotFound`] if `id` is absent.
    pub async fn update(&self, id: &str, f: impl FnOnce(T) -> T) -> Result<T, PlatonError> {
        let mut guard = self.items.write().await;
        let current = guard
            .remove(id)
            .ok_or_else(|| PlatonError::new(ErrorCode::NotFound, format!("'{id}' not found")).with_detail("id", id))?;
        let updated = f(current);
        guard.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Fetch a clone of the item at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotFound`] if `id` is absent.
    pub async fn get(&self, id: &str) -> Result<T, PlatonError> {
        self.items
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PlatonError::new(ErrorCode::NotFound, format!("'{id}' not found")).with_detail("id", id))
    }

    /// Remove the item at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotFound`] if `id` is absent.
    pub async fn delete(&self, id: &str) -> Result<(), PlatonError> {
        let mut guard = self.items.write().await;
        if guard.remove(id).is_none() {
            return Err(PlatonError::new(ErrorCode::NotFound, format!("'{id}' not found")).with_detail("id", id));
        }
        Ok(())
    }

    /// Clone of every item, in unspecified order.
    pub async fn list(&self) -> Vec<T> {
        self.items.read().await.values().cloned().collect()
    }

    /// `true` if `id` is present.
    pub async fn contains(&self, id: &str) -> bool {
        self.items.read().await.contains_key(id)
    }
}

impl<T: Clone + Send + Sync> Default for Catalog<T> {
    fn default() -> Self {
        Self::new()
    }
}
