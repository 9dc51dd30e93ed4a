//! Short ring buffer of classifier results used to damp single-frame noise.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::label::EmotionLabel;

/// Default number of samples kept for the majority vote.
pub const DEFAULT_HISTORY_LEN: usize = 3;

/// Largest accepted vote window.
pub const MAX_HISTORY_LEN: usize = 32;

/// Last `capacity` successful classifications, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionHistory {
    samples: VecDeque<EmotionLabel>,
    capacity: usize,
}

impl Default for EmotionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LEN)
    }
}

impl EmotionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_HISTORY_LEN);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full.
    ///
    /// `EmotionLabel::Error` is ignored so a failed tick never skews the vote.
    pub fn push(&mut self, label: EmotionLabel) {
        if label == EmotionLabel::Error {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(label);
    }

    /// Majority label. Ties go to whichever label appeared first in the buffer.
    pub fn stable(&self) -> Option<EmotionLabel> {
        // (label, count) in order of first appearance
        let mut tally: Vec<(EmotionLabel, usize)> = Vec::with_capacity(self.capacity);
        for label in &self.samples {
            match tally.iter_mut().find(|(l, _)| l == label) {
                Some((_, count)) => *count += 1,
                None => tally.push((*label, 1)),
            }
        }

        let mut best: Option<(EmotionLabel, usize)> = None;
        for (label, count) in tally {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best.map(|(label, _)| label)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn samples(&self) -> impl Iterator<Item = EmotionLabel> + '_ {
        self.samples.iter().copied()
    }
}
