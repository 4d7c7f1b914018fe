use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::debug;

struct PollTask {
    post_id: i64,
    generation: u64,
    ticker: Receiver<Instant>,
}

/// A single cancellable repeating timer for the open detail view.
///
/// `start` always replaces the running task, so at most one timer exists.
/// Dropping the ticker receiver releases the timer.
pub struct Poller {
    interval: Duration,
    active: Option<PollTask>,
    generation: u64,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            Duration::from_secs(5)
        } else {
            interval
        };
        Self {
            interval,
            active: None,
            generation: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(&mut self, post_id: i64) -> u64 {
        self.stop();
        self.generation = self.generation.wrapping_add(1);
        debug!(post_id, generation = self.generation, "poller: start");
        self.active = Some(PollTask {
            post_id,
            generation: self.generation,
            ticker: crossbeam_channel::tick(self.interval),
        });
        self.generation
    }

    pub fn stop(&mut self) -> Option<i64> {
        let task = self.active.take()?;
        debug!(
            post_id = task.post_id,
            generation = task.generation,
            "poller: stop"
        );
        Some(task.post_id)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_post(&self) -> Option<i64> {
        self.active.as_ref().map(|task| task.post_id)
    }

    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|task| task.generation)
    }

    /// Post to refresh if the timer fired since the last call. Missed ticks
    /// collapse into one refresh.
    pub fn due(&self) -> Option<i64> {
        let task = self.active.as_ref()?;
        let fired = task.ticker.try_iter().count();
        (fired > 0).then_some(task.post_id)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
