use std::collections::HashMap;

/// Last value sent to each control address. Fades start from here.
#[derive(Debug, Clone, Default)]
pub struct ControlCache {
    values: HashMap<String, f64>,
}

impl ControlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value written to `address`, 0.0 if it was never written.
    pub fn get(&self, address: &str) -> f64 {
        self.values.get(address).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, address: &str, value: f64) {
        match self.values.get_mut(address) {
            Some(v) => *v = value,
            None => {
                self.values.insert(address.to_string(), value);
            }
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.values.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
