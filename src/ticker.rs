use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, warn};

/// A named recurring background task with a stop signal.
///
/// The first tick fires one `period` after spawning. A tick that panics is
/// logged and the schedule carries on. Dropping the `Ticker` stops the task
/// at its next wake-up; `stop()` additionally waits for it to exit.
pub struct Ticker {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            // Late ticks are dropped rather than replayed in a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            debug!(ticker = name, period_ms = period.as_millis() as u64, "ticker started");
            loop {
                tokio::select! {
                    biased;
                    // Err means the Ticker itself was dropped
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut tick)) {
                            error!(
                                ticker = name,
                                panic = panic_message(payload.as_ref()),
                                "tick panicked; continuing on schedule"
                            );
                        }
                    }
                }
            }
            debug!(ticker = name, "ticker stopped");
        });

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop scheduling ticks and wait for the task to exit. A tick that is
    /// already running completes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(ticker = self.name, error = %e, "ticker task ended abnormally");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PERIOD: Duration = Duration::from_millis(100);

    fn counting_ticker(count: &Arc<AtomicUsize>) -> Ticker {
        let count = count.clone();
        Ticker::spawn("test", PERIOD, move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_starting_after_one_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker = counting_ticker(&count);

        time::sleep(PERIOD / 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(PERIOD * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker = counting_ticker(&count);

        time::sleep(PERIOD * 2 + PERIOD / 2).await;
        assert_eq!(ticker.name(), "test");
        ticker.stop().await;
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        time::sleep(PERIOD * 5).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_ticker_stops_the_task() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(counting_ticker(&count));

        time::sleep(PERIOD * 5).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_tick_does_not_halt_schedule() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let ticker = Ticker::spawn("flaky", PERIOD, move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick blows up");
            }
        });

        time::sleep(PERIOD * 3 + PERIOD / 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        ticker.stop().await;
    }

    #[test]
    fn extracts_panic_messages() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        let borrowed: Box<dyn Any + Send> = Box::new("bang");
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(owned.as_ref()), "boom");
        assert_eq!(panic_message(borrowed.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
