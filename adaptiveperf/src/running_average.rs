//! Fixed-window moving average over the most recent samples.
//!
//! The window is a circular buffer allocated once at construction. Each
//! insert overwrites the oldest sample and adjusts the mean by the
//! difference between the new and evicted values, so updates are O(1)
//! regardless of window size.

/// Default number of samples kept by a [`RunningAverage`].
pub const DEFAULT_SAMPLE_WINDOW: usize = 100;

/// Moving average over the last `capacity` samples.
///
/// # Example
///
/// ```
/// use adaptiveperf::RunningAverage;
///
/// let mut avg = RunningAverage::new(2);
/// avg.add_value(1.0);
/// avg.add_value(3.0);
/// avg.add_value(5.0); // evicts 1.0
///
/// assert_eq!(avg.average(), 4.0);
/// assert_eq!(avg.most_recent_value(), 5.0);
/// ```
#[derive(Debug, Clone)]
pub struct RunningAverage {
    values: Vec<f32>,
    /// Index of the most recent sample, `None` when empty.
    last_index: Option<usize>,
    count: usize,
    average: f32,
}

impl RunningAverage {
    /// Creates an empty average over `capacity` samples.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity.max(1)],
            last_index: None,
            count: 0,
            average: 0.0,
        }
    }

    /// Inserts a sample, evicting the oldest one once the window is full.
    pub fn add_value(&mut self, value: f32) {
        let oldest_index = match self.last_index {
            Some(index) => (index + 1) % self.values.len(),
            None => 0,
        };
        // Slots that were never written (or were cleared by reset) hold 0.
        let evicted = self.values[oldest_index];

        self.values[oldest_index] = value;
        self.last_index = Some(oldest_index);

        let total = self.average * self.count as f32 + value - evicted;
        self.count = (self.count + 1).min(self.values.len());
        self.average = total / self.count.max(1) as f32;
    }

    /// Mean of the retained samples, `0.0` when empty.
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Last inserted sample, `0.0` when empty.
    pub fn most_recent_value(&self) -> f32 {
        match self.last_index {
            Some(index) if self.count > 0 => self.values[index],
            _ => 0.0,
        }
    }

    /// Number of valid samples, at most [`capacity`](Self::capacity).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds `capacity` samples.
    pub fn is_full(&self) -> bool {
        self.count == self.values.len()
    }

    /// Clears all samples, keeping the capacity.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
        self.last_index = None;
        self.count = 0;
        self.average = 0.0;
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW)
    }
}
