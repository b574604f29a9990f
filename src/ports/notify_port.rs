//! Notification port.

use crate::domain::error::PairtraderError;
use crate::domain::live::NotificationEvent;

pub trait Notifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), PairtraderError>;
}
