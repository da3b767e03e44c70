//! Aegis Compaction Streaming Median
//!
//! Running median over a multiset of doubles that supports both insert and
//! delete. The lower half lives in a max-heap, the upper half in a min-heap;
//! their sizes never differ by more than one and every value on the left is
//! no greater than every value on the right. The median is cached after
//! each mutation, so reads are O(1).
//!
//! Insert and the heap half of delete are O(log n). Locating the value to
//! delete is a linear scan over the heap storage, so delete is O(n) overall.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec::{Persist, StateReader, StateWriter};
use aegis_common::config::MedianConfig;
use aegis_common::{AegisError, EncodingVersion, Result};
use std::cmp::Ordering;

/// Upper bound on the up-front reservation while loading a heap, so a
/// corrupt length cannot trigger a huge allocation before the reads fail.
const MAX_PREALLOC: usize = 4096;

// =============================================================================
// Heap
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeapOrder {
    /// Largest value on top.
    Max,
    /// Smallest value on top.
    Min,
}

/// Vec-backed binary heap with removal at an arbitrary index.
#[derive(Debug, Clone)]
struct Heap {
    data: Vec<f64>,
    order: HeapOrder,
}

impl Heap {
    fn with_capacity(order: HeapOrder, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            order,
        }
    }

    /// Build a heap from unordered values.
    fn from_vec(order: HeapOrder, data: Vec<f64>) -> Self {
        let mut heap = Self { data, order };
        for idx in (0..heap.data.len() / 2).rev() {
            heap.sift_down(idx);
        }
        heap
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn top(&self) -> Option<f64> {
        self.data.first().copied()
    }

    fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    /// True if `a` belongs above `b`.
    #[inline]
    fn precedes(&self, a: f64, b: f64) -> bool {
        match self.order {
            HeapOrder::Max => a.total_cmp(&b) == Ordering::Greater,
            HeapOrder::Min => a.total_cmp(&b) == Ordering::Less,
        }
    }

    fn push(&mut self, value: f64) {
        self.data.push(value);
        self.sift_up(self.data.len() - 1);
    }

    fn pop(&mut self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Index of one occurrence of `value`, by linear scan.
    fn position(&self, value: f64) -> Option<usize> {
        self.data
            .iter()
            .position(|&v| v == value || (v.is_nan() && value.is_nan()))
    }

    /// Remove the element at `idx`, which must be in bounds.
    fn remove_at(&mut self, idx: usize) -> f64 {
        let removed = self.data.swap_remove(idx);
        if idx < self.data.len() {
            // The moved tail element may belong either above or below.
            self.sift_up(idx);
            self.sift_down(idx);
        }
        removed
    }

    fn remove(&mut self, value: f64) -> bool {
        match self.position(value) {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.precedes(self.data[idx], self.data[parent]) {
                break;
            }
            self.data.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.data.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut best = idx;
            if left < len && self.precedes(self.data[left], self.data[best]) {
                best = left;
            }
            if right < len && self.precedes(self.data[right], self.data[best]) {
                best = right;
            }
            if best == idx {
                break;
            }
            self.data.swap(idx, best);
            idx = best;
        }
    }

    fn is_valid(&self) -> bool {
        (1..self.data.len()).all(|idx| !self.precedes(self.data[idx], self.data[(idx - 1) / 2]))
    }
}

// =============================================================================
// Median Tracker
// =============================================================================

/// Streaming median over a mutable multiset of doubles.
#[derive(Debug, Clone)]
pub struct MedianTracker {
    /// Lower half, largest on top.
    left: Heap,
    /// Upper half, smallest on top.
    right: Heap,
    median: f64,
}

impl MedianTracker {
    /// Empty tracker; each heap reserves room for half of `capacity_hint`.
    pub fn new(capacity_hint: usize) -> Self {
        let half = capacity_hint / 2 + 1;
        Self {
            left: Heap::with_capacity(HeapOrder::Max, half),
            right: Heap::with_capacity(HeapOrder::Min, half),
            median: f64::NAN,
        }
    }

    pub fn from_config(config: &MedianConfig) -> Self {
        Self::new(config.capacity_hint)
    }

    /// Number of values currently tracked.
    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Cached median; NaN while empty.
    pub fn median(&self) -> f64 {
        self.median
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.median = f64::NAN;
    }

    /// Add one value.
    pub fn insert(&mut self, value: f64) {
        let (left_len, right_len) = (self.left.len(), self.right.len());

        if left_len == 0 && right_len == 0 {
            self.left.push(value);
            self.median = value;
            return;
        }

        match left_len.cmp(&right_len) {
            Ordering::Greater => {
                if let Some(top) = self.left.top().filter(|&top| value < top) {
                    self.left.pop();
                    self.right.push(top);
                    self.left.push(value);
                } else {
                    self.right.push(value);
                }
            }
            Ordering::Less => {
                if let Some(top) = self.right.top().filter(|&top| value > top) {
                    self.right.pop();
                    self.left.push(top);
                    self.right.push(value);
                } else {
                    self.left.push(value);
                }
            }
            Ordering::Equal => {
                if value < self.median {
                    self.left.push(value);
                } else {
                    self.right.push(value);
                }
            }
        }

        self.refresh_median();
    }

    /// Remove one occurrence of `value`. Returns false, leaving the tracker
    /// untouched, if the value is not present.
    pub fn delete(&mut self, value: f64) -> bool {
        let removed = if value <= self.median {
            self.left.remove(value) || self.right.remove(value)
        } else {
            self.right.remove(value) || self.left.remove(value)
        };
        if !removed {
            return false;
        }

        if self.left.len() > self.right.len() + 1 {
            if let Some(top) = self.left.pop() {
                self.right.push(top);
            }
        } else if self.right.len() > self.left.len() + 1 {
            if let Some(top) = self.right.pop() {
                self.left.push(top);
            }
        }

        self.refresh_median();
        true
    }

    fn refresh_median(&mut self) {
        self.median = match (self.left.top(), self.right.top()) {
            (None, None) => f64::NAN,
            (Some(lo), Some(hi)) if self.left.len() == self.right.len() => (lo + hi) / 2.0,
            (Some(lo), _) if self.left.len() > self.right.len() => lo,
            (_, Some(hi)) => hi,
            (Some(lo), None) => lo,
        };
    }

    /// Heap and partition invariants, checked after a load.
    fn validate(&self) -> Result<()> {
        if self.left.len().abs_diff(self.right.len()) > 1 {
            return Err(AegisError::DeserializeFailed(format!(
                "median heaps unbalanced: {} vs {}",
                self.left.len(),
                self.right.len()
            )));
        }
        if !self.left.is_valid() || !self.right.is_valid() {
            return Err(AegisError::DeserializeFailed(
                "median heap order violated".to_string(),
            ));
        }
        if let (Some(lo), Some(hi)) = (self.left.top(), self.right.top()) {
            if lo.total_cmp(&hi) == Ordering::Greater {
                return Err(AegisError::DeserializeFailed(format!(
                    "median halves overlap: lower top {} above upper top {}",
                    lo, hi
                )));
            }
        }
        Ok(())
    }
}

impl Default for MedianTracker {
    fn default() -> Self {
        Self::from_config(&MedianConfig::default())
    }
}

// =============================================================================
// Persistence
// =============================================================================

fn write_heap<W: StateWriter + ?Sized>(writer: &mut W, heap: &Heap) {
    writer.write_u64(heap.len() as u64);
    for &value in heap.as_slice() {
        writer.write_f64(value);
    }
}

fn read_heap<R: StateReader + ?Sized>(reader: &mut R, order: HeapOrder) -> Result<Heap> {
    let len = reader.read_u64()?;
    let len = usize::try_from(len)
        .map_err(|_| AegisError::DeserializeFailed(format!("median heap length {} too large", len)))?;
    let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        values.push(reader.read_f64()?);
    }
    Ok(Heap::from_vec(order, values))
}

impl Persist for MedianTracker {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        write_heap(writer, &self.left);
        write_heap(writer, &self.right);
        writer.write_f64(self.median);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, _version: EncodingVersion) -> Result<Self> {
        let left = read_heap(reader, HeapOrder::Max)?;
        let right = read_heap(reader, HeapOrder::Min)?;
        let cached = reader.read_f64()?;

        let mut tracker = Self {
            left,
            right,
            median: f64::NAN,
        };
        tracker.validate()?;
        tracker.refresh_median();

        let consistent = cached == tracker.median || (cached.is_nan() && tracker.median.is_nan());
        if !consistent {
            return Err(AegisError::DeserializeFailed(format!(
                "cached median {} does not match contents ({})",
                cached, tracker.median
            )));
        }
        Ok(tracker)
    }
}

// =============================================================================
// Tests
// =============================================================================
