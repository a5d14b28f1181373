//! Seam between the notification store and the REST API.

use futures_util::future::BoxFuture;

use printrelay_core::Notification;

use crate::client::ClientError;

/// Notification endpoints used for reconciliation and read receipts.
pub trait NotificationApi: Send + Sync {
    /// Fetches the authoritative list, newest first.
    fn fetch_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientError>>;

    /// Marks one notification as read.
    fn mark_read<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>>;

    /// Marks every notification as read.
    fn mark_all_read(&self) -> BoxFuture<'_, Result<(), ClientError>>;
}
