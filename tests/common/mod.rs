#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use drive_store::{ByteStream, RemoteError, RemoteFileMeta, RemoteFilePage, RemoteStore};
use futures::StreamExt;

pub const FOLDER: &str = "folder-1";

pub fn remote_time(secs_after_noon: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs_after_noon)
}

pub fn file(id: &str, name: &str, modified_time: DateTime<Utc>) -> RemoteFileMeta {
    RemoteFileMeta {
        id: id.to_string(),
        name: name.to_string(),
        modified_time,
        mime_type: "application/octet-stream".to_string(),
        checksum: Some(format!("md5-{id}")),
    }
}

pub fn folder(id: &str, name: &str) -> RemoteFileMeta {
    RemoteFileMeta {
        id: id.to_string(),
        name: name.to_string(),
        modified_time: remote_time(0),
        mime_type: drive_store::FOLDER_MIME_TYPE.to_string(),
        checksum: None,
    }
}

/// In-memory remote folder. Page `n` is requested with token `"n"`.
#[derive(Default)]
pub struct MemoryStore {
    pages: Vec<Vec<RemoteFileMeta>>,
    contents: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    hanging: HashSet<String>,
    failing_listing: bool,
    repeat_token: bool,
    pub list_calls: Mutex<Vec<Option<String>>>,
    pub downloads: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, entries: Vec<RemoteFileMeta>) -> Self {
        self.pages.push(entries);
        self
    }

    pub fn content(mut self, id: &str, data: &[u8]) -> Self {
        self.contents.insert(id.to_string(), data.to_vec());
        self
    }

    /// Downloads of `id` fail after the first chunk.
    pub fn broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    /// Downloads of `id` never yield a chunk.
    pub fn hanging(mut self, id: &str) -> Self {
        self.hanging.insert(id.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    /// Every page hands back the token it was requested with.
    pub fn repeating_token(mut self) -> Self {
        self.repeat_token = true;
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> drive_store::Result<RemoteFilePage> {
        assert_eq!(folder_id, FOLDER);
        self.list_calls
            .lock()
            .unwrap()
            .push(page_token.map(str::to_string));
        if self.failing_listing {
            return Err(RemoteError::Api {
                status: 403,
                message: "insufficient permissions".to_string(),
            });
        }

        let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let entries = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = if self.repeat_token {
            Some(page_token.unwrap_or("1").to_string())
        } else if index + 1 < self.pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };
        Ok(RemoteFilePage {
            entries,
            next_page_token,
        })
    }

    async fn download(&self, file_id: &str) -> drive_store::Result<ByteStream> {
        self.downloads.lock().unwrap().push(file_id.to_string());
        if self.hanging.contains(file_id) {
            return Ok(futures::stream::pending().boxed());
        }
        let data = self.contents.get(file_id).cloned().unwrap_or_default();
        if self.broken.contains(file_id) {
            let chunks: Vec<drive_store::Result<Bytes>> = vec![
                Ok(Bytes::from(data)),
                Err(RemoteError::Parse("connection reset mid-transfer".to_string())),
            ];
            return Ok(futures::stream::iter(chunks).boxed());
        }
        let (head, tail) = data.split_at(data.len() / 2);
        let chunks: Vec<drive_store::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];
        Ok(futures::stream::iter(chunks).boxed())
    }
}
