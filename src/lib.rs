use std::time::Duration;

pub use crate::error::{Error, Result};
pub use crate::frame::{Frame, HEADER_LEN};
pub use crate::server::{active_listeners, ServerGroup, ShutdownHandle};
pub use crate::window::{Bucket, SlidingWindow, Totals};

mod error;
mod frame;
mod server;
mod window;

#[derive(Clone)]
pub struct Config {
    //Force-exit deadline for a graceful listener drain
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(360),
        }
    }
}
