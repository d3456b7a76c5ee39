use std::collections::VecDeque;

/// Trailing `max_len` entries of the series, order preserved.
#[must_use]
pub fn bounded<T: Copy>(series: &[T], max_len: usize) -> Vec<T> {
    series[series.len().saturating_sub(max_len)..].to_vec()
}

/// Rolling window that keeps at most the last `max_len` values pushed into it.
#[derive(Clone, Debug)]
#[must_use]
pub struct BoundedSeries<T> {
    values: VecDeque<T>,
    max_len: usize,
}

impl<T: Copy> BoundedSeries<T> {
    pub fn new(max_len: usize) -> Self {
        Self { values: VecDeque::with_capacity(max_len), max_len }
    }

    pub fn push(&mut self, value: T) {
        if self.max_len == 0 {
            return;
        }
        if self.values.len() == self.max_len {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}
