//! Bounded memory of alerts already sent, and of alerts still failing

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::Measurement;

/// Identity of one probe result: the endpoint and the moment it was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub endpoint_id: i64,
    pub checked_at: DateTime<Utc>,
}

impl AlertKey {
    /// `None` for messages without a probe timestamp; those cannot be told apart
    pub fn of(measurement: &Measurement) -> Option<Self> {
        measurement.checked_at.map(|checked_at| Self {
            endpoint_id: measurement.endpoint_id,
            checked_at,
        })
    }
}

/// FIFO set of the most recent `capacity` alert keys
#[derive(Debug)]
pub struct AlertLedger {
    capacity: usize,
    order: VecDeque<AlertKey>,
    seen: HashSet<AlertKey>,
}

impl AlertLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.seen.contains(key)
    }

    /// Remember `key`, forgetting the oldest entry when full
    pub fn record(&mut self, key: AlertKey) {
        if !self.seen.insert(key) {
            return;
        }
        self.order.push_back(key);

        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Failed alert attempts per message body, for the most recent `capacity` bodies
///
/// Keyed on the raw body so messages without a probe timestamp are counted too.
#[derive(Debug)]
pub struct FailureCounts {
    capacity: usize,
    order: VecDeque<Vec<u8>>,
    counts: HashMap<Vec<u8>, u32>,
}

impl FailureCounts {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            counts: HashMap::with_capacity(capacity),
        }
    }

    /// Count one more failure for `body`; returns the failures so far
    pub fn increment(&mut self, body: &[u8]) -> u32 {
        if let Some(count) = self.counts.get_mut(body) {
            *count += 1;
            return *count;
        }

        self.counts.insert(body.to_vec(), 1);
        self.order.push_back(body.to_vec());
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.counts.remove(&oldest);
        }
        1
    }

    pub fn clear(&mut self, body: &[u8]) {
        if self.counts.remove(body).is_some() {
            self.order.retain(|entry| entry.as_slice() != body);
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
