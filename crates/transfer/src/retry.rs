use std::time::Duration;

/// Default backoff sequence in milliseconds.
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 5] = [0, 3000, 5000, 10000, 20000];

/// Fixed, ordered sequence of delays applied between retry attempts.
///
/// A schedule of `k` delays allows `k` retries, i.e. `k + 1` attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_RETRY_DELAYS_MS)
    }
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().map(|&ms| Duration::from_millis(ms)).collect())
    }

    /// A schedule that never retries.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Starts a fresh attempt counter over this schedule.
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            schedule: self,
            attempt: 0,
        }
    }
}

/// Attempt counter over a [`RetrySchedule`].
#[derive(Debug, Clone)]
pub struct Backoff<'a> {
    schedule: &'a RetrySchedule,
    attempt: usize,
}

impl Backoff<'_> {
    /// Consumes the next delay. Returns `None` once the schedule is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.schedule.delays.get(self.attempt).copied()?;
        self.attempt += 1;
        Some(delay)
    }

    /// Number of delays consumed so far.
    pub fn attempts(&self) -> usize {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.schedule.delays.len()
    }

    /// Restarts the sequence after forward progress.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
