//! Result pages returned by list and query operations.

use bson::Document;

/// How the `total` of a [`Page`] is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalScope {
    /// Count every document in the collection, ignoring the filter.
    Collection,
    /// Count only the documents matching the filter.
    Matching,
}

/// A single page of results together with a total count.
///
/// `total` is independent of the skip and limit bounds that produced `items`; which
/// documents it counts is decided by the [`TotalScope`] the page was fetched with.
///
/// # Example
///
/// ```ignore
/// let page = Page::builder(documents)
///     .with_total(100)
///     .build();
///
/// assert_eq!(page.count(), page.items.len());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    /// The documents contained in this page.
    pub items: Vec<Document>,
    /// Total count of documents in scope, across all pages.
    pub total: u64,
}

impl Page {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<Document>) -> PageBuilder {
        PageBuilder::new(items)
    }

    /// Number of documents in this page.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Builder for constructing [`Page`] instances with fluent API.
pub struct PageBuilder {
    items: Vec<Document>,
    total: u64,
}

impl PageBuilder {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<Document>) -> Self {
        Self { items, total: 0 }
    }

    /// Sets the total count of documents in scope.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page {
        Page {
            items: self.items,
            total: self.total,
        }
    }
}
