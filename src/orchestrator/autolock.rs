use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::cancel::CancelToken;
use super::lock;

pub const MIN_AUTO_LOCK_MINUTES: u64 = 1;

struct Timer {
    timeout: Duration,
    last_activity: Instant,
}

/// Inactivity timer. Any activity pushes the deadline out; the background
/// task fires `on_expire` once the deadline passes without activity.
#[derive(Clone)]
pub struct AutoLock {
    timer: Arc<Mutex<Timer>>,
    changed: Arc<Notify>,
}

impl AutoLock {
    pub fn new(minutes: u64) -> Self {
        Self {
            timer: Arc::new(Mutex::new(Timer {
                timeout: minutes_to_duration(minutes),
                last_activity: Instant::now(),
            })),
            changed: Arc::new(Notify::new()),
        }
    }

    pub fn touch(&self) {
        lock(&self.timer).last_activity = Instant::now();
        self.changed.notify_one();
    }

    pub fn set_minutes(&self, minutes: u64) {
        lock(&self.timer).timeout = minutes_to_duration(minutes);
        self.changed.notify_one();
    }

    pub fn minutes(&self) -> u64 {
        lock(&self.timer).timeout.as_secs() / 60
    }

    fn deadline(&self) -> Instant {
        let timer = lock(&self.timer);
        timer.last_activity + timer.timeout
    }

    /// Run until `shutdown` is cancelled.
    pub fn spawn<F>(&self, shutdown: CancelToken, on_expire: F) -> JoinHandle<()>
    where
        F: Fn() + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let deadline = this.deadline();
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        if Instant::now() >= this.deadline() {
                            debug!("Inactivity deadline reached");
                            on_expire();
                            lock(&this.timer).last_activity = Instant::now();
                        }
                    }
                    _ = this.changed.notified() => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }
}

fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(MIN_AUTO_LOCK_MINUTES) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = {
            let fired = fired.clone();
            move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };
        (fired, hook)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_inactivity() {
        let timer = AutoLock::new(1);
        let (fired, hook) = counter();
        let shutdown = CancelToken::new();
        let task = timer.spawn(shutdown.clone(), hook);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_expiry() {
        let timer = AutoLock::new(1);
        let (fired, hook) = counter();
        let shutdown = CancelToken::new();
        let _task = timer.spawn(shutdown.clone(), hook);

        tokio::time::sleep(Duration::from_secs(45)).await;
        timer.touch();
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        shutdown.cancel();
    }

    #[test]
    fn test_minimum_one_minute() {
        let timer = AutoLock::new(0);
        assert_eq!(timer.minutes(), 1);
        timer.set_minutes(30);
        assert_eq!(timer.minutes(), 30);
    }
}
