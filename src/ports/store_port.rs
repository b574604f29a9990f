//! Persistence port for the live position and its history.

use crate::domain::error::PairtraderError;
use crate::domain::live::MonitorRecord;
use crate::domain::position::{PositionState, Trade};

/// What one step writes back after deciding on the stored position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionWrite {
    /// New position state; `None` leaves the stored row untouched.
    pub state: Option<PositionState>,
    /// Trade closed by this step.
    pub trade: Option<Trade>,
}

impl PositionWrite {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.trade.is_none()
    }
}

pub trait PositionStore {
    /// The persisted state, or `Flat` when nothing has been stored yet.
    /// A plain read with no lock held afterwards.
    fn load_position(&self) -> Result<PositionState, PairtraderError>;

    /// Exclusive read-modify-write of the position.
    ///
    /// `update` receives the stored state while the store holds its write lock
    /// and returns what to write. The write (position and trade together) is
    /// committed before the lock is released; if `update` fails nothing is
    /// written. An overlapping `update_position` waits for that commit or
    /// rollback, or fails with `Storage`; it never sees the pre-update state.
    fn update_position(
        &self,
        update: &mut dyn FnMut(PositionState) -> Result<PositionWrite, PairtraderError>,
    ) -> Result<(), PairtraderError>;

    fn append_monitor_sample(&self, record: &MonitorRecord) -> Result<(), PairtraderError>;
}
