//! Utility functionality for building a mainloop for a plugin
//!

mod ticking;
pub use ticking::*;

use exporter_api::CancellationToken;

pub struct Mainloop;

impl Mainloop {
    /// Build a mainloop that calls its function every `duration` until `cancellation` fires
    ///
    /// The first call happens right away, not after the first `duration` has elapsed.
    pub fn ticking_every<State>(
        duration: std::time::Duration,
        state: State,
        cancellation: CancellationToken,
    ) -> MainloopTick<State>
    where
        State: Sized,
    {
        MainloopTick {
            state,
            logging: false,
            cancellation,
            duration,
        }
    }
}
