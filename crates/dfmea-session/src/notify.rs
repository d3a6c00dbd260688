use std::sync::Mutex;

use serde::Serialize;

pub const SAVE_MESSAGE: &str = "Generated DFMEA successfully.";
pub const UPLOAD_MESSAGE: &str = "Uploaded successfully.";
pub const INDEXING_SUB_MESSAGE: &str = "Upload and indexing completed successfully.";

/// Displayable success message handed to the host; the host decides how long to show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_message: Option<String>,
}

impl Notification {
    pub fn dfmea_saved() -> Self {
        Self {
            message: SAVE_MESSAGE.to_owned(),
            sub_message: Some(INDEXING_SUB_MESSAGE.to_owned()),
        }
    }

    pub fn files_uploaded() -> Self {
        Self {
            message: UPLOAD_MESSAGE.to_owned(),
            sub_message: Some(INDEXING_SUB_MESSAGE.to_owned()),
        }
    }

    pub fn programme_added(name: &str) -> Self {
        Self {
            message: format!("New Programme \"{name}\" added successfully."),
            sub_message: None,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Keeps notifications until the host drains them.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn take(&self) -> Vec<Notification> {
        match self.received.lock() {
            Ok(mut received) => std::mem::take(&mut *received),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        match self.received.lock() {
            Ok(mut received) => received.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
