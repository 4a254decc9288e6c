use async_trait::async_trait;

use crate::error::Result;
use crate::models::ChannelMessage;

/// Read access to a platform's channel history.
///
/// Implementations return pages newest-first. The scraper never assumes an
/// order beyond "keep asking with the smallest id seen until a page comes
/// back empty".
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Messages older than `before` (the newest page when `None`).
    async fn fetch_page(&self, channel: &str, before: Option<i64>) -> Result<Vec<ChannelMessage>>;

    /// Bytes of the photo attached to `message`.
    async fn fetch_media(&self, channel: &str, message: &ChannelMessage) -> Result<Vec<u8>>;
}
