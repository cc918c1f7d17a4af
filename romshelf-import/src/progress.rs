//! Import progress reporting.

/// Trait for receiving catalog import progress updates.
pub trait ImportProgress {
    /// Called after each batch of entries is written.
    fn on_entries(&self, current: usize, total: usize);

    /// Called when a phase starts (e.g., "Importing nes.dat").
    fn on_phase(&self, message: &str);

    /// Called when the import is complete.
    fn on_complete(&self, message: &str);
}

/// A no-op progress reporter that discards all updates.
pub struct SilentProgress;

impl ImportProgress for SilentProgress {
    fn on_entries(&self, _current: usize, _total: usize) {}
    fn on_phase(&self, _message: &str) {}
    fn on_complete(&self, _message: &str) {}
}

/// A progress reporter that logs to the `log` crate.
pub struct LogProgress;

impl ImportProgress for LogProgress {
    fn on_entries(&self, current: usize, total: usize) {
        if current.is_multiple_of(500) || current == total {
            log::info!("  [{}/{}] entries", current, total);
        }
    }

    fn on_phase(&self, message: &str) {
        log::info!("{}", message);
    }

    fn on_complete(&self, message: &str) {
        log::info!("{}", message);
    }
}
