use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::RemoteFilePage;

/// Content of a remote file, delivered in bounded chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Narrow view of a remote folder store.
///
/// Implementations are expected to normalize their native listing format into
/// [`RemoteFilePage`]; pagination is driven by the caller.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one page of the direct children of `folder_id`.
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>)
        -> Result<RemoteFilePage>;

    /// Open the content of `file_id` as a byte stream.
    async fn download(&self, file_id: &str) -> Result<ByteStream>;
}
