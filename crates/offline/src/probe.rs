//! Connectivity probe capability.
//!
//! The retry executor only needs a yes/no answer before spending an
//! attempt; the platform-specific reachability machinery lives outside
//! this crate.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Query whether the network is currently reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// True when the device currently has connectivity.
    async fn is_connected(&self) -> bool;
}

/// Probe backed by a toggleable flag.
///
/// Useful in tests and for callers that receive reachability updates from
/// a platform listener and only need to mirror the latest value.
#[derive(Debug)]
pub struct FlagProbe {
    connected: AtomicBool,
}

impl FlagProbe {
    /// Create a probe with the given initial state.
    pub fn new(connected: bool) -> Self {
        Self { connected: AtomicBool::new(connected) }
    }

    /// Update the reported connectivity state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for FlagProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityProbe for FlagProbe {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
