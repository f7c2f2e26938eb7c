//! Video uploads.
//!
//! `videoUpload` inserts a placeholder video carrying `uploadId` for every
//! accepted file. The transfer itself belongs to the host, which reports
//! progress through [`begin_upload`] and the outcome through
//! [`finish_upload`] or [`abort_upload`]. The placeholder's `uploadStatus`
//! follows the loader: `reading`, `uploading`, then `complete`. Model updates caused by an
//! upload run in transparent batches so they never become undo steps.

use super::{insert_video, is_video_allowed, VIDEO};
use crate::command::{parse_params, Command, OneOrMany};
use crate::config::VideoUploadConfig;
use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use crate::notification::Notifications;
use crate::plugin::Plugin;
use crate::upload::{FileRepository, LoaderStatus, UploadFile};
use folio_engine::conversion::downcast_helpers;
use folio_engine::model::{
    Attributes, BatchKind, ChangeBlock, ChangeEntry, ChangeObserver, Document, Model, NodeId, Scheduler, Schema,
    Writer,
};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const UPLOAD_ID: &str = "uploadId";
pub const UPLOAD_STATUS: &str = "uploadStatus";

const PLACEHOLDER_CLASS: &str = "ck-video-upload-placeholder";
const NOTIFICATION_NAMESPACE: &str = "upload";

fn upload_id(document: &Document, node: NodeId) -> Option<String> {
    document
        .attribute(node, UPLOAD_ID)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Videos with an `uploadId` in `node`, `node` included.
fn uploading_videos(document: &Document, node: NodeId) -> Vec<(NodeId, String)> {
    std::iter::once(node)
        .chain(document.descendants(node))
        .filter(|candidate| document.is(*candidate, VIDEO))
        .filter_map(|video| upload_id(document, video).map(|id| (video, id)))
        .collect()
}

/// The attached video waiting for upload `id`.
fn find_placeholder(document: &Document, id: &str) -> Option<NodeId> {
    document
        .descendants(document.root())
        .into_iter()
        .find(|node| document.is(*node, VIDEO) && upload_id(document, *node).as_deref() == Some(id))
}

fn set_status(writer: &mut Writer<'_>, id: &str, status: &str) -> folio_engine::Result<()> {
    let Some(video) = find_placeholder(writer.document(), id) else {
        return Ok(());
    };
    writer.set_attribute_on(UPLOAD_STATUS, Value::String(status.to_string()), video)
}

fn remove_placeholder(model: &mut Model, id: String) -> Result<()> {
    let batch = model.create_batch(BatchKind::Transparent);
    model.enqueue_change(Some(batch), move |writer| {
        if let Some(video) = find_placeholder(writer.document(), &id) {
            debug!(%id, "Removing upload placeholder");
            writer.remove_node(video)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Starts reading files whose placeholders entered the document and aborts
/// uploads whose placeholders left it.
pub struct UploadTracker {
    repository: Rc<RefCell<FileRepository>>,
}

impl UploadTracker {
    pub fn new(repository: Rc<RefCell<FileRepository>>) -> Self {
        Self { repository }
    }
}

impl ChangeObserver for UploadTracker {
    fn on_change_block(&mut self, block: &ChangeBlock<'_>, scheduler: &mut Scheduler<'_>) -> folio_engine::Result<()> {
        let document = block.document;
        let mut started = Vec::new();
        for change in block.changes {
            match change {
                ChangeEntry::Insert { node: Some(node), .. } if document.is_attached(*node) => {
                    let mut repository = self.repository.borrow_mut();
                    for (_, id) in uploading_videos(document, *node) {
                        let Some(loader) = repository.loader_mut(&id) else {
                            continue;
                        };
                        if loader.status() == LoaderStatus::Idle {
                            loader.read();
                            started.push(id);
                        }
                    }
                }
                ChangeEntry::Remove { node: Some(node), .. } if !document.is_attached(*node) => {
                    let mut repository = self.repository.borrow_mut();
                    for (_, id) in uploading_videos(document, *node) {
                        if let Some(loader) = repository.loader_mut(&id).filter(|loader| !loader.is_finished()) {
                            info!(%id, "Placeholder removed, aborting upload");
                            loader.abort();
                        }
                    }
                }
                _ => {}
            }
        }

        for id in started {
            let batch = scheduler.create_batch(BatchKind::Transparent);
            scheduler.enqueue_change(Some(batch), move |writer| set_status(writer, &id, "reading"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoUploadParams {
    pub file: OneOrMany<UploadFile>,
}

/// `videoUpload`: inserts a placeholder video for each accepted file.
pub struct VideoUploadCommand {
    repository: Rc<RefCell<FileRepository>>,
    notifications: Rc<RefCell<Notifications>>,
    config: VideoUploadConfig,
    enabled: bool,
}

impl Command for VideoUploadCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        self.enabled = is_video_allowed(document, schema);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: VideoUploadParams = parse_params(params)?;
        let (files, rejected): (Vec<_>, Vec<_>) = params
            .file
            .into_vec()
            .into_iter()
            .partition(|file| self.config.accepts(&file.mime_type));
        for file in &rejected {
            warn!(name = %file.name, mime_type = %file.mime_type, "Unsupported video type");
            self.notifications.borrow_mut().show_warning(
                format!("{} is not a supported video", file.name),
                Some("Upload failed".to_string()),
                Some(NOTIFICATION_NAMESPACE),
            );
        }
        if files.is_empty() {
            return Ok(());
        }

        let repository = self.repository.clone();
        model.change(|writer| {
            for file in files {
                let id = repository.borrow_mut().create_loader(file);
                let mut attributes = Attributes::new();
                attributes.insert(UPLOAD_ID.to_string(), Value::String(id.clone()));
                let video = insert_video(writer, attributes)?;
                debug!(?video, %id, "Inserted upload placeholder");
            }
            Ok(())
        })?;
        Ok(())
    }
}

fn loader_status(repository: &RefCell<FileRepository>, id: &str) -> Result<LoaderStatus> {
    repository
        .borrow()
        .loader(id)
        .map(|loader| loader.status())
        .ok_or_else(|| EditorError::Upload(format!("unknown upload {id}")))
}

/// Reports that the file of upload `id` has been read and its transfer
/// started. Only a reading loader moves on; other states are left alone.
pub fn begin_upload(editor: &mut Editor, id: &str) -> Result<()> {
    let repository = editor.file_repository();
    let status = loader_status(&repository, id)?;
    if status != LoaderStatus::Reading {
        debug!(%id, ?status, "Upload is not reading, nothing to begin");
        return Ok(());
    }
    if let Some(loader) = repository.borrow_mut().loader_mut(id) {
        loader.upload();
    }
    let model = editor.model_mut();
    let batch = model.create_batch(BatchKind::Transparent);
    let upload = id.to_string();
    model.enqueue_change(Some(batch), move |writer| set_status(writer, &upload, "uploading"))?;
    debug!(%id, "Upload started");
    Ok(())
}

/// Reports the outcome of upload `id`. A finished upload fills in `src`; a
/// failed one removes its placeholder and warns the user. A loader still
/// reading passes through `uploading` first; one that never started reading
/// is rejected.
pub fn finish_upload(editor: &mut Editor, id: &str, outcome: std::result::Result<String, String>) -> Result<()> {
    let repository = editor.file_repository();
    match loader_status(&repository, id)? {
        LoaderStatus::Aborted => {
            repository.borrow_mut().destroy_loader(id);
            return Ok(());
        }
        LoaderStatus::Idle => {
            return Err(EditorError::Upload(format!("upload {id} has not started")));
        }
        LoaderStatus::Reading => begin_upload(editor, id)?,
        _ => {}
    }

    match outcome {
        Ok(url) => {
            if let Some(loader) = repository.borrow_mut().loader_mut(id) {
                loader.complete(url.clone());
            }
            let model = editor.model_mut();
            let batch = model.create_batch(BatchKind::Transparent);
            let upload = id.to_string();
            model.enqueue_change(Some(batch), move |writer| {
                let Some(video) = find_placeholder(writer.document(), &upload) else {
                    return Ok(());
                };
                writer.set_attribute_on("src", Value::String(url), video)?;
                writer.set_attribute_on(UPLOAD_STATUS, Value::String("complete".into()), video)?;
                writer.remove_attribute_from(UPLOAD_ID, video)
            })?;
            info!(%id, "Upload complete");
        }
        Err(message) => {
            if let Some(loader) = repository.borrow_mut().loader_mut(id) {
                loader.fail();
            }
            warn!(%id, %message, "Upload failed");
            editor.notifications_handle().borrow_mut().show_warning(
                message,
                Some("Upload failed".to_string()),
                Some(NOTIFICATION_NAMESPACE),
            );
            remove_placeholder(editor.model_mut(), id.to_string())?;
        }
    }

    repository.borrow_mut().destroy_loader(id);
    Ok(())
}

/// Cancels upload `id` and removes its placeholder.
pub fn abort_upload(editor: &mut Editor, id: &str) -> Result<()> {
    let repository = editor.file_repository();
    match repository.borrow_mut().loader_mut(id) {
        Some(loader) => loader.abort(),
        None => return Err(EditorError::Upload(format!("unknown upload {id}"))),
    }
    remove_placeholder(editor.model_mut(), id.to_string())?;
    repository.borrow_mut().destroy_loader(id);
    Ok(())
}

/// Upload placeholders and the `videoUpload` command.
pub struct VideoUpload;

impl Plugin for VideoUpload {
    fn name(&self) -> &'static str {
        "VideoUpload"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Video"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        editor.model_mut().schema_mut().extend(VIDEO, |definition| {
            definition
                .allow_attributes
                .extend([UPLOAD_ID.to_string(), UPLOAD_STATUS.to_string()]);
        });

        let mut conversion = editor.conversion();
        downcast_helpers::attribute_to_attribute(&mut conversion.editing_downcast, VIDEO, UPLOAD_STATUS, |value| {
            (value.as_str() != Some("complete")).then(|| ("class".to_string(), PLACEHOLDER_CLASS.to_string()))
        });
        downcast_helpers::consume_attribute(&mut conversion.data_downcast, VIDEO, UPLOAD_STATUS);
        conversion.for_downcast(|dispatcher| downcast_helpers::consume_attribute(dispatcher, VIDEO, UPLOAD_ID));
        drop(conversion);

        let repository = editor.file_repository();
        editor
            .model_mut()
            .add_observer(Rc::new(RefCell::new(UploadTracker::new(repository.clone()))));
        let command = VideoUploadCommand {
            repository,
            notifications: editor.notifications_handle(),
            config: editor.config().video.upload.clone(),
            enabled: false,
        };
        editor.add_command("videoUpload", command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Paragraph, Video};
    use serde_json::json;

    fn editor() -> Editor {
        let mut editor = Editor::create(
            Default::default(),
            vec![Box::new(Paragraph), Box::new(Video), Box::new(VideoUpload)],
        )
        .unwrap();
        editor.set_data("<p></p>").unwrap();
        editor
    }

    fn upload(editor: &mut Editor) -> String {
        editor
            .execute(
                "videoUpload",
                json!({ "file": { "name": "clip.mp4", "mimeType": "video/mp4" } }),
            )
            .unwrap();
        let document = editor.model().document();
        let video = document.children(document.root())[0];
        upload_id(document, video).unwrap()
    }

    #[test]
    fn test_placeholder_starts_reading() {
        let mut editor = editor();
        let id = upload(&mut editor);

        let document = editor.model().document();
        let video = find_placeholder(document, &id).unwrap();
        assert_eq!(document.attribute(video, UPLOAD_STATUS), Some(&json!("reading")));
        assert_eq!(
            editor.file_repository().borrow().loader(&id).map(|loader| loader.status()),
            Some(LoaderStatus::Reading)
        );
        assert!(editor.editing_html().contains(PLACEHOLDER_CLASS));
        assert_eq!(editor.get_data().unwrap(), "<figure class=\"video\"><video controls=\"\"></video></figure>");
    }

    #[test]
    fn test_begin_upload_marks_placeholder_uploading() {
        let mut editor = editor();
        let id = upload(&mut editor);
        begin_upload(&mut editor, &id).unwrap();

        let document = editor.model().document();
        let video = find_placeholder(document, &id).unwrap();
        assert_eq!(document.attribute(video, UPLOAD_STATUS), Some(&json!("uploading")));
        assert_eq!(
            editor.file_repository().borrow().loader(&id).map(|loader| loader.status()),
            Some(LoaderStatus::Uploading)
        );
        assert!(editor.editing_html().contains(PLACEHOLDER_CLASS));
    }

    #[test]
    fn test_finish_before_reading_is_rejected() {
        let mut editor = editor();
        let id = editor
            .file_repository()
            .borrow_mut()
            .create_loader(UploadFile { name: "clip.mp4".into(), mime_type: "video/mp4".into() });
        let err = finish_upload(&mut editor, &id, Ok("https://cdn/clip.mp4".into())).unwrap_err();
        assert!(matches!(err, EditorError::Upload(_)));
        assert_eq!(
            editor.file_repository().borrow().loader(&id).map(|loader| loader.status()),
            Some(LoaderStatus::Idle)
        );
    }

    #[test]
    fn test_completed_upload_sets_source() {
        let mut editor = editor();
        let id = upload(&mut editor);
        finish_upload(&mut editor, &id, Ok("https://cdn/clip.mp4".into())).unwrap();

        assert_eq!(
            editor.get_data().unwrap(),
            "<figure class=\"video\"><video controls=\"\" src=\"https://cdn/clip.mp4\"></video></figure>"
        );
        assert!(!editor.editing_html().contains(PLACEHOLDER_CLASS));
        assert!(editor.file_repository().borrow().is_empty());
    }

    #[test]
    fn test_failed_upload_removes_placeholder_and_warns() {
        let mut editor = editor();
        let id = upload(&mut editor);
        finish_upload(&mut editor, &id, Err("Network error".into())).unwrap();

        let document = editor.model().document();
        assert!(find_placeholder(document, &id).is_none());
        let warnings: Vec<_> = editor.notifications().warnings().cloned().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Network error");
        assert_eq!(warnings[0].namespace.as_deref(), Some("upload"));
    }

    #[test]
    fn test_abort_removes_placeholder() {
        let mut editor = editor();
        let id = upload(&mut editor);
        abort_upload(&mut editor, &id).unwrap();

        assert!(find_placeholder(editor.model().document(), &id).is_none());
        assert!(editor.file_repository().borrow().loader(&id).is_none());
        assert!(matches!(abort_upload(&mut editor, &id), Err(EditorError::Upload(_))));
    }

    #[test]
    fn test_rejects_unsupported_types() {
        let mut editor = editor();
        editor
            .execute("videoUpload", json!({ "file": [{ "name": "a.txt", "mimeType": "text/plain" }] }))
            .unwrap();
        let document = editor.model().document();
        assert!(!document.is(document.children(document.root())[0], VIDEO));
        assert_eq!(editor.notifications().warnings().count(), 1);
    }
}
