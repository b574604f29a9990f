//! Notifier that emits structured log events.

use tracing::info;

use crate::domain::error::PairtraderError;
use crate::domain::live::NotificationEvent;
use crate::ports::notify_port::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), PairtraderError> {
        match event {
            NotificationEvent::SignalRejected {
                signal,
                sample,
                verdict,
            } => {
                info!(
                    target: "pairtrader::notify",
                    %signal,
                    timestamp = %sample.timestamp,
                    z = ?sample.z,
                    reason = %verdict.reason(),
                    "signal rejected"
                );
            }
            NotificationEvent::Entered(position) => {
                info!(
                    target: "pairtrader::notify",
                    direction = %position.direction,
                    timestamp = %position.entry_timestamp,
                    ratio = position.entry_ratio,
                    z = position.entry_z,
                    notional_per_leg = position.notional_per_leg,
                    "entered"
                );
            }
            NotificationEvent::Exited(trade) => {
                info!(
                    target: "pairtrader::notify",
                    direction = %trade.direction,
                    reason = %trade.exit_reason,
                    timestamp = %trade.exit_timestamp,
                    net_pnl = trade.net_pnl,
                    pnl_pct = trade.pnl_pct(),
                    duration_hours = trade.duration_hours(),
                    "exited"
                );
            }
        }
        Ok(())
    }
}
