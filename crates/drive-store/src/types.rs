//! Canonical remote metadata and the Drive v3 wire types it is decoded from.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by Drive-native document types (Docs, Sheets, shortcuts...).
const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular binary content that can be downloaded as-is.
    File,
    /// A nested folder. Never recursed into.
    Folder,
    /// A remote-native document without downloadable binary content.
    Native,
}

impl EntryKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else if mime_type.starts_with(NATIVE_MIME_PREFIX) {
            EntryKind::Native
        } else {
            EntryKind::File
        }
    }
}

/// One entry of a remote folder, normalized from whatever the store returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileMeta {
    /// Stable identity of the entry in the remote store.
    pub id: String,
    /// Display name, used as the local file name.
    pub name: String,
    /// Authoritative modification instant.
    pub modified_time: DateTime<Utc>,
    /// Raw type tag reported by the store.
    pub mime_type: String,
    /// Content checksum when the store provides one (MD5 for Drive).
    pub checksum: Option<String>,
}

impl RemoteFileMeta {
    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mime_type(&self.mime_type)
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == EntryKind::Folder
    }
}

/// A single page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct RemoteFilePage {
    pub entries: Vec<RemoteFileMeta>,
    pub next_page_token: Option<String>,
}

/// `files` resource restricted to the fields the kiosk requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: DateTime<Utc>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

/// `files.list` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<DriveFile> for RemoteFileMeta {
    fn from(file: DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            modified_time: file.modified_time,
            mime_type: file.mime_type,
            checksum: file.md5_checksum,
        }
    }
}

impl From<FilesListResponse> for RemoteFilePage {
    fn from(response: FilesListResponse) -> Self {
        Self {
            entries: response.files.into_iter().map(RemoteFileMeta::from).collect(),
            next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
        }
    }
}
