//! Messages for the user, collected for the host to display.

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub title: Option<String>,
    /// Groups related notifications (`upload`).
    pub namespace: Option<String>,
}

#[derive(Debug, Default)]
pub struct Notifications {
    shown: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, notification: Notification) {
        match notification.kind {
            NotificationKind::Warning => warn!(message = %notification.message, "Notification"),
            _ => info!(message = %notification.message, "Notification"),
        }
        self.shown.push(notification);
    }

    pub fn show_warning(&mut self, message: impl Into<String>, title: Option<String>, namespace: Option<&str>) {
        self.show(Notification {
            kind: NotificationKind::Warning,
            message: message.into(),
            title,
            namespace: namespace.map(str::to_string),
        });
    }

    pub fn all(&self) -> &[Notification] {
        &self.shown
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Notification> {
        self.shown
            .iter()
            .filter(|n| n.kind == NotificationKind::Warning)
    }

    /// Hands the collected notifications to the caller.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_collected() {
        let mut notifications = Notifications::new();
        notifications.show_warning("Upload failed", Some("video.mp4".into()), Some("upload"));
        assert_eq!(notifications.warnings().count(), 1);
        let drained = notifications.drain();
        assert_eq!(drained[0].namespace.as_deref(), Some("upload"));
        assert!(notifications.all().is_empty());
    }
}
