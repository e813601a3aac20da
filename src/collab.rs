//! Interfaces to the systems around the editor.
//!
//! The editor never talks to a database or a server directly. Committed
//! objects go to an [`ObjectStore`], and item lists come from a
//! [`DatasetSource`]. Both are traits so hosts can plug in their own backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EditorError;
use crate::shape::ItemObject;

/// Search query sent to a dataset backend, as field name to value.
pub type SearchQuery = BTreeMap<String, String>;

/// Errors reported by a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend could not be reached; the request can be retried
    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },

    /// Backend refused the request
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// Requested dataset or item does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Persistence for committed objects.
pub trait ObjectStore {
    /// Store a new or updated object.
    fn save_object(&mut self, object: &ItemObject) -> Result<(), BackendError>;

    /// Remove an object from an item.
    fn delete_object(&mut self, item_id: &str, object_id: &str) -> Result<(), BackendError>;
}

// ============================================================================
// Dataset Navigation
// ============================================================================

/// Summary of one dataset item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: String,
    #[serde(default)]
    pub split: Option<String>,
}

/// One page of dataset items. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<DatasetItem>,
    pub total: u32,
    pub page: u32,
    pub size: u32,
    pub pages: u32,
}

/// Paged access to the items of a dataset.
pub trait DatasetSource {
    fn get_dataset_items(
        &self,
        dataset_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ItemPage, BackendError>;

    fn search_dataset_items(
        &self,
        dataset_id: &str,
        query: &SearchQuery,
        page: u32,
        size: u32,
    ) -> Result<ItemPage, BackendError>;
}

/// Dataset held in memory, paged on request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDataset {
    pub items: Vec<DatasetItem>,
}

impl StaticDataset {
    pub fn new(items: Vec<DatasetItem>) -> Self {
        Self { items }
    }

    fn page_of(items: Vec<DatasetItem>, page: u32, size: u32) -> Result<ItemPage, BackendError> {
        if page == 0 || size == 0 {
            return Err(BackendError::rejected(format!(
                "invalid page {page} of size {size}"
            )));
        }
        let start = (page - 1).checked_mul(size).ok_or_else(|| {
            BackendError::rejected(format!("page {page} of size {size} is out of range"))
        })?;
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let pages = total.div_ceil(size);
        let start = start as usize;
        let items = items.into_iter().skip(start).take(size as usize).collect();
        Ok(ItemPage {
            items,
            total,
            page,
            size,
            pages,
        })
    }

    fn matches(item: &DatasetItem, query: &SearchQuery) -> bool {
        query.iter().all(|(field, value)| match field.as_str() {
            "id" => item.id.contains(value.as_str()),
            "split" => item.split.as_deref() == Some(value.as_str()),
            _ => false,
        })
    }
}

impl DatasetSource for StaticDataset {
    fn get_dataset_items(
        &self,
        _dataset_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ItemPage, BackendError> {
        Self::page_of(self.items.clone(), page, size)
    }

    fn search_dataset_items(
        &self,
        _dataset_id: &str,
        query: &SearchQuery,
        page: u32,
        size: u32,
    ) -> Result<ItemPage, BackendError> {
        let found = self
            .items
            .iter()
            .filter(|item| Self::matches(item, query))
            .cloned()
            .collect();
        Self::page_of(found, page, size)
    }
}

/// Position in a paged item list, used for previous/next navigation.
#[derive(Debug, Clone)]
pub struct NavigationContext {
    dataset_id: String,
    page_size: u32,
    query: Option<SearchQuery>,
    page: ItemPage,
    index: usize,
}

impl NavigationContext {
    /// Load the first page and point at its first item.
    pub fn start(
        source: &dyn DatasetSource,
        dataset_id: impl Into<String>,
        page_size: u32,
        query: Option<SearchQuery>,
    ) -> Result<Self, EditorError> {
        let mut nav = Self {
            dataset_id: dataset_id.into(),
            page_size,
            query,
            page: ItemPage {
                items: Vec::new(),
                total: 0,
                page: 0,
                size: page_size,
                pages: 0,
            },
            index: 0,
        };
        nav.page = nav.fetch(source, 1)?;
        Ok(nav)
    }

    pub fn current(&self) -> Option<&DatasetItem> {
        self.page.items.get(self.index)
    }

    pub fn page(&self) -> &ItemPage {
        &self.page
    }

    /// Move to the next item, loading the following page at a page boundary.
    ///
    /// Returns `None` and stays in place at the end of the dataset.
    pub fn next(
        &mut self,
        source: &dyn DatasetSource,
    ) -> Result<Option<&DatasetItem>, EditorError> {
        if self.index + 1 < self.page.items.len() {
            self.index += 1;
        } else if self.page.page < self.page.pages {
            let page = self.fetch(source, self.page.page + 1)?;
            if page.items.is_empty() {
                return Ok(None);
            }
            self.page = page;
            self.index = 0;
        } else {
            return Ok(None);
        }
        Ok(self.current())
    }

    /// Move to the previous item, loading the preceding page at a page boundary.
    pub fn previous(
        &mut self,
        source: &dyn DatasetSource,
    ) -> Result<Option<&DatasetItem>, EditorError> {
        if self.index > 0 {
            self.index -= 1;
        } else if self.page.page > 1 {
            let page = self.fetch(source, self.page.page - 1)?;
            if page.items.is_empty() {
                return Ok(None);
            }
            self.index = page.items.len() - 1;
            self.page = page;
        } else {
            return Ok(None);
        }
        Ok(self.current())
    }

    fn fetch(&self, source: &dyn DatasetSource, page: u32) -> Result<ItemPage, EditorError> {
        log::debug!("Loading page {} of dataset '{}'", page, self.dataset_id);
        let result = match &self.query {
            Some(query) => {
                source.search_dataset_items(&self.dataset_id, query, page, self.page_size)
            }
            None => source.get_dataset_items(&self.dataset_id, page, self.page_size),
        };
        result.map_err(EditorError::from)
    }
}
