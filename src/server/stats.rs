use std::sync::atomic::{AtomicBool, Ordering};

pub struct LurkServerStats {
    is_started: AtomicBool,
}

impl LurkServerStats {
    pub fn new() -> LurkServerStats {
        LurkServerStats { is_started: AtomicBool::new(false) }
    }

    /// Called when node is started to accept connections.
    pub fn on_server_started(&self) {
        assert!(!self.is_started.load(Ordering::Relaxed), "server shoudn't be started yet");
        self.is_started.store(true, Ordering::Relaxed);
    }

    pub fn on_server_finished(&self) {
        /* Not implemented */
    }

    /// Returns true if server is started.
    /// There's no guarantee it hasn't finished yet.
    pub fn is_server_started(&self) -> bool {
        self.is_started.load(Ordering::Relaxed)
    }
}

impl Default for LurkServerStats {
    fn default() -> Self {
        Self::new()
    }
}
