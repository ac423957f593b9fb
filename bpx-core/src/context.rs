use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::FatalError;
use crate::fs::{FileSystem, LocalFs};

/// Tunables for scans that read file contents.
#[derive(Clone, Copy, Debug)]
pub struct ScanOptions {
    /// Read buffer; pause requests are polled once per buffer.
    pub buffer_size: usize,
    /// Sleep between `should_pause` polls while paused.
    pub pause_poll: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            buffer_size: 1 << 20,
            pause_poll: Duration::from_millis(100),
        }
    }
}

/// Cross-thread "stop everything" flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct FatalSignal {
    raised: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first reason wins.
    pub fn raise(&self, reason: impl Into<String>) {
        if let Ok(mut r) = self.reason.lock() {
            if r.is_none() {
                *r = Some(reason.into());
            }
        }
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// `Err` once raised.
    pub fn check(&self) -> Result<(), FatalError> {
        if !self.is_raised() {
            return Ok(());
        }
        let reason = self
            .reason
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .unwrap_or_else(|| "fatal error".to_string());
        Err(FatalError::Aborted { reason })
    }
}

/// Everything a scan needs from its caller: storage access, the fatal flag and
/// options. Owned by the caller; there is no process-wide state.
pub struct Context {
    fs: Box<dyn FileSystem>,
    fatal: FatalSignal,
    pub options: ScanOptions,
}

impl Context {
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self { fs, fatal: FatalSignal::new(), options: ScanOptions::default() }
    }

    pub fn local() -> Self {
        Self::new(Box::new(LocalFs::default()))
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn fatal(&self) -> &FatalSignal {
        &self.fatal
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::local()
    }
}
