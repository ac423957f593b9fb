use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

/// Shared progress state with an optional background ticker that logs the
/// current stage and percentage. Scans feed it through [`Progress::sink`].
#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    interval: Duration,
    pub stage: Arc<Mutex<String>>,
    fraction_bits: Arc<AtomicU64>,
    pub files_done: Arc<AtomicUsize>,
    pub files_total: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self::with_interval(enabled, Duration::from_secs(5))
    }

    pub fn with_interval(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval,
            stage: Arc::new(Mutex::new(String::new())),
            fraction_bits: Arc::new(AtomicU64::new(0f64.to_bits())),
            files_done: Arc::new(AtomicUsize::new(0)),
            files_total: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_stage(&self, s: &str) {
        if let Ok(mut stage) = self.stage.lock() {
            *stage = s.to_string();
        }
    }

    pub fn set_files_total(&self, n: usize) {
        self.files_total.store(n, Ordering::Relaxed);
    }

    pub fn inc_file(&self) {
        self.files_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Clamped to 0.0..=1.0.
    pub fn set_fraction(&self, f: f64) {
        self.fraction_bits.store(f.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.fraction_bits.load(Ordering::Relaxed))
    }

    /// A callback suitable for the verifier's progress parameter.
    pub fn sink(&self) -> impl FnMut(f64) + '_ {
        move |f| self.set_fraction(f)
    }

    /// A callback suitable for the verifier's per-file parameter.
    pub fn file_sink(&self) -> impl FnMut(&str, bool) + '_ {
        move |_, _| self.inc_file()
    }

    /// One ticker line.
    pub fn status_line(&self, elapsed: Duration) -> String {
        let stage = self.stage.lock().map(|s| s.clone()).unwrap_or_default();
        format!(
            "[{:>4}s] {} | files {}/{} | {:.1}%",
            elapsed.as_secs(),
            stage,
            self.files_done.load(Ordering::Relaxed),
            self.files_total.load(Ordering::Relaxed),
            self.fraction() * 100.0
        )
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        self.running.store(true, Ordering::Relaxed);
        let this = self.clone();
        thread::spawn(move || {
            let t0 = Instant::now();
            while this.running.load(Ordering::Relaxed) {
                thread::sleep(this.interval);
                if !this.running.load(Ordering::Relaxed) {
                    break;
                }
                tracing::info!("{}", this.status_line(t0.elapsed()));
            }
        });
    }

    pub fn stop(&self) {
        if self.enabled {
            self.running.store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_clamps_and_stores() {
        let p = Progress::new(false);
        {
            let mut sink = p.sink();
            sink(0.25);
        }
        assert_eq!(p.fraction(), 0.25);
        p.set_fraction(1.5);
        assert_eq!(p.fraction(), 1.0);
    }

    #[test]
    fn file_sink_counts_checked_files() {
        let p = Progress::new(false);
        p.set_stage("Verifying");
        p.set_files_total(3);
        {
            let mut files = p.file_sink();
            files("a.bin", true);
            files("b.bin", false);
        }
        p.set_fraction(0.5);
        assert_eq!(p.files_done.load(Ordering::Relaxed), 2);
        assert_eq!(p.status_line(Duration::from_secs(7)), "[   7s] Verifying | files 2/3 | 50.0%");
    }

    #[test]
    fn ticker_starts_and_stops() {
        let p = Progress::with_interval(true, Duration::from_millis(5));
        p.set_stage("Verifying");
        p.start();
        thread::sleep(Duration::from_millis(20));
        p.stop();
        assert!(!p.running.load(Ordering::Relaxed));
    }
}
