use drive_store::{RemoteError, RemoteFileMeta, RemoteStore};
use tracing::{debug, instrument};

/// Collect every direct child of `folder_id`, following page tokens.
///
/// Entries keep the order the store returned them in.
#[instrument(skip(store))]
pub async fn list_folder(
    store: &dyn RemoteStore,
    folder_id: &str,
) -> Result<Vec<RemoteFileMeta>, RemoteError> {
    let mut entries = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list_page(folder_id, token.as_deref()).await?;
        pages += 1;
        entries.extend(page.entries);

        match page.next_page_token {
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(RemoteError::StalledPagination(next));
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(pages, entries = entries.len(), "listing complete");
    Ok(entries)
}
