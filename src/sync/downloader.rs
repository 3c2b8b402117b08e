use std::path::Path;
use std::time::SystemTime;

use drive_store::{RemoteFileMeta, RemoteStore};
use filetime::FileTime;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::DownloadError;

/// Stream `entry` into `destination` and stamp its modification time.
///
/// The stamp is written last: a transfer that dies halfway leaves a file
/// whose timestamp does not match and is fetched again on the next pass.
#[instrument(skip(store, entry), fields(name = %entry.name, id = %entry.id))]
pub async fn download(
    store: &dyn RemoteStore,
    entry: &RemoteFileMeta,
    destination: &Path,
) -> Result<u64, DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| DownloadError::io(parent, err))?;
    }

    let mut stream = store.download(&entry.id).await?;
    let mut file = fs::File::create(destination)
        .await
        .map_err(|err| DownloadError::io(destination, err))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|err| DownloadError::io(destination, err))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|err| DownloadError::io(destination, err))?;
    drop(file);

    let mtime = FileTime::from_unix_time(
        entry.modified_time.timestamp(),
        entry.modified_time.timestamp_subsec_nanos(),
    );
    let atime = FileTime::from_system_time(SystemTime::now());
    filetime::set_file_times(destination, atime, mtime)
        .map_err(|err| DownloadError::io(destination, err))?;

    debug!(bytes = written, "download complete");
    Ok(written)
}
