//! Page creation with chunked block appends.
//!
//! The remote store takes at most 100 child blocks per request. A page is
//! created with the first chunk; every further chunk is appended in order.
//! If an append fails the remaining chunks are skipped (appending them would
//! scramble the block order) and the page is reported as partial. Pages are
//! never deleted after a failed append.

use std::sync::Arc;

use crate::blocks::Block;
use crate::client::RemoteStore;
use crate::error::PageError;
use crate::properties::PropertyMap;
use crate::ratelimit::RateLimiter;
use crate::render::render_blocks;

/// Blocks per create or append request.
pub const CHUNK_SIZE: usize = 100;

/// A page that exists in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
    pub page_id: String,
    /// Number of top-level blocks in the document.
    pub block_count: usize,
    /// Some appends failed; the page holds only a prefix of the blocks.
    pub partial: bool,
    /// Top-level blocks that never reached the page.
    pub blocks_dropped: usize,
}

pub struct PageWriter {
    store: Arc<dyn RemoteStore>,
    limiter: RateLimiter,
    database_id: String,
}

impl PageWriter {
    pub fn new(store: Arc<dyn RemoteStore>, limiter: RateLimiter, database_id: impl Into<String>) -> Self {
        Self {
            store,
            limiter,
            database_id: database_id.into(),
        }
    }

    /// Create a page titled `title` holding `blocks`.
    pub async fn write(
        &self,
        title: &str,
        properties: &PropertyMap,
        blocks: &[Block],
    ) -> Result<PageWrite, PageError> {
        let rendered = render_blocks(blocks);
        let mut chunks = rendered.chunks(CHUNK_SIZE);
        let first = chunks.next().unwrap_or(&[]);

        self.limiter.acquire().await;
        let page_id = self
            .store
            .create_page(&self.database_id, &properties.to_json(), first)
            .await
            .map_err(|source| PageError::Create {
                title: title.to_string(),
                source,
            })?;
        tracing::info!("Created database entry: {} -> {}", title, page_id);

        let mut written = first.len();
        for chunk in chunks {
            self.limiter.acquire().await;
            if let Err(e) = self.store.append_blocks(&page_id, chunk).await {
                tracing::error!(
                    "Failed to append blocks to page {}: {} ({} of {} blocks dropped)",
                    page_id,
                    e,
                    rendered.len() - written,
                    rendered.len()
                );
                break;
            }
            written += chunk.len();
        }

        let blocks_dropped = rendered.len() - written;
        Ok(PageWrite {
            page_id,
            block_count: blocks.len(),
            partial: blocks_dropped > 0,
            blocks_dropped,
        })
    }
}
