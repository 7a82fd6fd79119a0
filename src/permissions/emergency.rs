//! Emergency shutdown switch

use std::sync::atomic::{AtomicBool, Ordering};

/// Operator kill-switch
///
/// While shutdown is active every non-console check resolves to `False`
/// without touching cached data. The flag starts cleared and only changes
/// through explicit operator action.
#[derive(Debug, Default)]
pub struct EmergencyOptions {
    shutdown: AtomicBool,
}

impl EmergencyOptions {
    /// Create with shutdown cleared
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the given initial state
    pub fn with_shutdown(shutdown: bool) -> Self {
        Self {
            shutdown: AtomicBool::new(shutdown),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Set or clear the shutdown flag, returning the previous state
    pub fn set_shutdown(&self, shutdown: bool) -> bool {
        let previous = self.shutdown.swap(shutdown, Ordering::SeqCst);
        if previous != shutdown {
            if shutdown {
                tracing::warn!("Emergency shutdown enabled: all non-console checks now deny");
            } else {
                tracing::warn!("Emergency shutdown cleared");
            }
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_toggle() {
        let options = EmergencyOptions::new();
        assert!(!options.is_shutdown());

        assert!(!options.set_shutdown(true));
        assert!(options.is_shutdown());
        assert!(options.set_shutdown(false));
        assert!(!options.is_shutdown());
    }

    #[test]
    fn test_visible_across_threads() {
        let options = Arc::new(EmergencyOptions::new());
        let writer = options.clone();

        std::thread::spawn(move || writer.set_shutdown(true))
            .join()
            .unwrap();

        assert!(options.is_shutdown());
    }
}
