// SPDX-License-Identifier: MIT

//! Idle-shutdown timer (§4.8): the bus exits once no spool activity has been observed for
//! `idle_timeout` (default 30 minutes), so it never runs forever on an abandoned workspace.

use crate::bus::Bus;
use ojb_core::Clock;
use ojb_transport::Transport;

impl<T: Transport, C: Clock> Bus<T, C> {
    /// Re-evaluate the idle clock; request shutdown if the threshold has elapsed (§4.8 step 4).
    pub fn check_idle(&self) {
        let elapsed = self.idle_elapsed();
        if elapsed >= self.config.idle_timeout {
            tracing::info!(idle_secs = elapsed.as_secs(), "idle timeout reached, requesting shutdown");
            self.request_shutdown();
        }
    }
}
