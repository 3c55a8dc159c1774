//! Lazily populated, memoized label resolver.

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::client::ErrataClient;
use crate::error::Result;

use super::sources::LabelSource;
use super::table::LabelTable;

/// Maps labels to IDs, fetching the table from its source on first use.
///
/// The resolver assumes server-side IDs never change while it lives, so the
/// table is never refreshed.
pub struct LabelResolver {
    /// Client used by the source.
    client: ErrataClient,
    /// Where the table comes from.
    source: Box<dyn LabelSource>,
    /// Resolved table.
    table: OnceCell<LabelTable>,
}

impl LabelResolver {
    /// Creates an unresolved resolver.
    #[must_use]
    pub fn new(client: ErrataClient, source: Box<dyn LabelSource>) -> Self {
        Self {
            client,
            source,
            table: OnceCell::new(),
        }
    }

    /// Returns true once the table has been fetched.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.table.initialized()
    }

    /// Returns the table, fetching it if necessary.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the fetch and parse errors from the
    /// source. A failed fetch leaves the resolver unresolved.
    pub async fn table(&self) -> Result<&LabelTable> {
        self.table
            .get_or_try_init(|| async {
                info!("Loading {} labels", self.source.enumeration());
                let table = self.source.load(&self.client).await?;
                debug!("Loaded {} {} labels", table.len(), table.name());
                Ok(table)
            })
            .await
    }

    /// Resolves one label.
    ///
    /// # Errors
    ///
    /// Returns a lookup error for unknown labels, or any error from loading.
    pub async fn resolve(&self, label: &str) -> Result<i64> {
        self.table().await?.get(label)
    }

    /// Resolves several labels, preserving order.
    ///
    /// # Errors
    ///
    /// Fails on the first unknown label.
    pub async fn resolve_many<S: AsRef<str> + Sync>(&self, labels: &[S]) -> Result<Vec<i64>> {
        self.table().await?.get_many(labels)
    }
}

impl std::fmt::Debug for LabelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelResolver")
            .field("enumeration", &self.source.enumeration())
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}
