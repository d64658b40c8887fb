//! Time-windowed scalar signal used for forest health and the control knobs.

/// Window mean and previous value closer than this count as unchanged; a
/// steady window's mean is off by a few ulps.
const CHANGE_EPSILON: f64 = 1e-9;

/// A scalar with a bounded history window, most recent value first.
///
/// The window always holds at least one value and at most `lookback + 1`.
#[derive(Debug, Clone)]
pub struct Parameter {
    values: Vec<f64>,
    lookback: usize,
}

impl Parameter {
    pub fn new(initial: f64, lookback: usize) -> Self {
        let mut values = Vec::with_capacity(lookback + 1);
        values.push(initial);
        Self { values, lookback }
    }

    /// Insert a new current value, evicting the oldest past the window.
    pub fn push(&mut self, value: f64) {
        self.values.insert(0, value);
        self.values.truncate(self.lookback + 1);
    }

    /// Overwrite the current value without shifting the window.
    pub fn set_current(&mut self, value: f64) {
        self.values[0] = value;
    }

    pub fn current(&self) -> f64 {
        self.values[0]
    }

    pub fn previous(&self) -> f64 {
        self.values.get(1).copied().unwrap_or(self.values[0])
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation over the window.
    pub fn stddev(&self) -> f64 {
        let mean = self.mean();
        let var = self
            .values
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.values.len() as f64;
        var.sqrt()
    }

    /// Mean per-push change across the window (positive = rising).
    pub fn velocity(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let diffs = self.values.windows(2).map(|w| w[0] - w[1]);
        diffs.sum::<f64>() / (self.values.len() - 1) as f64
    }

    pub fn change(&self) -> f64 {
        self.mean() - self.previous()
    }

    pub fn has_changed(&self) -> bool {
        self.change().abs() > CHANGE_EPSILON
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Linearly map `value` from one range to another, clamped to the output range.
pub fn remap(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if in_max == in_min {
        return out_min;
    }
    let scaled = (value - in_min) / (in_max - in_min) * (out_max - out_min) + out_min;
    let (lo, hi) = if out_min <= out_max {
        (out_min, out_max)
    } else {
        (out_max, out_min)
    };
    scaled.clamp(lo, hi)
}
