//! Notification channel factory and handles.

use super::types::Notification;
use tokio::sync::mpsc;
use tracing::warn;

/// Buffer size for the notification channel; bounded so a stalled
/// dispatcher cannot grow memory without limit.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

pub type NotificationSender = mpsc::Sender<Notification>;
pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// Create a new notification channel.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Fire-and-forget send used by the services.
///
/// `sender` being `None` means no dispatcher is attached. A full or closed
/// channel is logged and dropped; notifications never block or fail the
/// state change that produced them.
pub fn emit(sender: Option<&NotificationSender>, notification: Notification) {
    let Some(sender) = sender else {
        return;
    };
    if let Err(e) = sender.try_send(notification) {
        warn!(error = %e, "Dropped notification, dispatcher unavailable");
    }
}
