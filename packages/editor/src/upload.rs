//! File repository: tracks files being read and uploaded.
//!
//! Transfers happen outside the editor. The host reports the outcome of an
//! upload and the feature that started it updates the model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoaderStatus {
    Idle,
    Reading,
    Uploading,
    Complete,
    Error,
    Aborted,
}

/// A file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileLoader {
    pub id: String,
    pub file: UploadFile,
    status: LoaderStatus,
    uploaded_url: Option<String>,
}

impl FileLoader {
    pub fn status(&self) -> LoaderStatus {
        self.status
    }

    pub fn uploaded_url(&self) -> Option<&str> {
        self.uploaded_url.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            LoaderStatus::Complete | LoaderStatus::Error | LoaderStatus::Aborted
        )
    }

    pub fn read(&mut self) {
        if self.status == LoaderStatus::Idle {
            self.status = LoaderStatus::Reading;
        }
    }

    pub fn upload(&mut self) {
        if matches!(self.status, LoaderStatus::Idle | LoaderStatus::Reading) {
            self.status = LoaderStatus::Uploading;
        }
    }

    pub fn complete(&mut self, url: String) {
        self.status = LoaderStatus::Complete;
        self.uploaded_url = Some(url);
    }

    pub fn fail(&mut self) {
        self.status = LoaderStatus::Error;
    }

    pub fn abort(&mut self) {
        if !self.is_finished() {
            self.status = LoaderStatus::Aborted;
        }
    }
}

#[derive(Debug, Default)]
pub struct FileRepository {
    loaders: IndexMap<String, FileLoader>,
}

impl FileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loader for `file` and returns its id.
    pub fn create_loader(&mut self, file: UploadFile) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        debug!(%id, file = %file.name, "Created file loader");
        self.loaders.insert(
            id.clone(),
            FileLoader {
                id: id.clone(),
                file,
                status: LoaderStatus::Idle,
                uploaded_url: None,
            },
        );
        id
    }

    pub fn loader(&self, id: &str) -> Option<&FileLoader> {
        self.loaders.get(id)
    }

    pub fn loader_mut(&mut self, id: &str) -> Option<&mut FileLoader> {
        self.loaders.get_mut(id)
    }

    pub fn destroy_loader(&mut self, id: &str) -> Option<FileLoader> {
        self.loaders.shift_remove(id)
    }

    pub fn loaders(&self) -> impl Iterator<Item = &FileLoader> {
        self.loaders.values()
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}
