use std::thread;
use std::time::{Duration, Instant};

/// Block while `should_pause` says so, sleeping `poll` between checks. The time
/// spent waiting is added to `paused` and also returned.
pub fn wait_while_paused(should_pause: &dyn Fn() -> bool, poll: Duration, paused: &mut Duration) -> Duration {
    if !should_pause() {
        return Duration::ZERO;
    }
    let t0 = Instant::now();
    while should_pause() {
        thread::sleep(poll);
    }
    let waited = t0.elapsed();
    *paused += waited;
    waited
}
