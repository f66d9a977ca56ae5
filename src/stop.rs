//! Graceful-stop signal, polled at filename boundaries.
//!
//! Two sources: an operator-created stop file, and an in-process flag set
//! by the ctrl-c handler (and by tests).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct StopFlag {
    stop_file: Option<PathBuf>,
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new(stop_file: Option<PathBuf>) -> Self {
        Self {
            stop_file,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        self.stop_file
            .as_ref()
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}
