use crate::CoreResult;
use async_trait::async_trait;

pub mod memory;

pub const DECK_EXT: &str = ".decks";
pub const CARD_SOURCE_EXT: &str = ".cardSources";
pub const CARD_EXT: &str = ".cards";
pub const HISTORY_EXT: &str = ".history";
pub const REVIEW_LOG_EXT: &str = ".revlog";

/// Named-blob persistence the index store snapshots into.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Replaces the blob `name` as a whole.
    async fn write_blob(&self, name: &str, bytes: Vec<u8>) -> CoreResult<()>;

    /// Fails with `NotFound` when no such blob exists.
    async fn read_blob(&self, name: &str) -> CoreResult<Vec<u8>>;

    /// Names ending in `suffix`, sorted. A store that was never created lists as empty.
    async fn list_blobs(&self, suffix: &str) -> CoreResult<Vec<String>>;
}
