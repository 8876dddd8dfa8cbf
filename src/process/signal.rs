use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::SigId;

/// Signal registrations that set a shutdown flag. Unregistered on drop.
#[derive(Debug)]
pub struct ShutdownSignals {
    ids: Vec<SigId>,
}

impl ShutdownSignals {
    /// Makes SIGINT and SIGTERM raise `flag` instead of killing the process.
    pub fn register(flag: Arc<AtomicBool>) -> io::Result<Self> {
        let mut ids = Vec::with_capacity(2);
        for signal in [SIGINT, SIGTERM] {
            ids.push(signal_hook::flag::register(signal, Arc::clone(&flag))?);
        }
        Ok(Self { ids })
    }
}

impl Drop for ShutdownSignals {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Keeps the interactive shell alive when Ctrl-C reaches the whole
/// foreground process group; the running program still gets the signal.
pub fn ignore_interrupts() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_sigterm_sets_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let signals = ShutdownSignals::register(Arc::clone(&flag)).unwrap();

        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(flag.load(Ordering::SeqCst));

        drop(signals);
    }
}
