//! Audio ingest: turns fixed-size device callbacks into overlapping
//! fixed-duration analysis windows.
//!
//! The producer side (`IngestQueue::ingest`) is called from the audio
//! device's real-time callback and never waits: enqueueing is a `try_lock`
//! plus O(1) deque ops, and a full queue evicts its oldest block. The
//! consumer side drains blocks with short timed polls and assembles them
//! into sliding windows.

use crate::config::AudioConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, TryLockError};
use std::time::Duration;

/// One fixed-size chunk of mono samples from the device callback.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock(Vec<f32>);

impl AudioBlock {
    pub fn new(samples: Vec<f32>) -> Self {
        Self(samples)
    }

    pub fn samples(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The last `window_secs` of audio, handed downstream exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct SlidingWindow(Vec<f32>);

impl SlidingWindow {
    pub fn samples(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Bounded block queue between the device callback and the consumer loop.
/// Overflow policy is drop-oldest.
pub struct IngestQueue {
    inner: Mutex<VecDeque<AudioBlock>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Called from the device callback. Never blocks: a contended lock
    /// drops the block instead of waiting, a full queue evicts its oldest
    /// entry. Returns whether the block was admitted.
    pub fn ingest(&self, block: AudioBlock) -> bool {
        let mut guard = match self.inner.try_lock() {
            Ok(g) => g,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        if guard.len() == self.capacity {
            guard.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(block);
        drop(guard);

        self.available.notify_one();
        true
    }

    /// Consumer-side timed poll. Returns `None` on an empty queue after
    /// `timeout` without busy-spinning.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioBlock> {
        let guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let (mut guard, _) = match self
            .available
            .wait_timeout_while(guard, timeout, |q| q.is_empty())
        {
            Ok(pair) => pair,
            Err(poisoned) => poisoned.into_inner(),
        };

        guard.pop_front()
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks discarded so far, whether by overflow or lock contention.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Accumulates drained blocks and cuts overlapping windows.
///
/// When the accumulator reaches `target_samples` the most recent
/// `target_samples` become a window and the accumulator is truncated to the
/// most recent `sample_rate` samples: each cycle advances by
/// `window_secs - 1` seconds and carries 1 second of overlap.
#[derive(Clone, Debug)]
pub struct WindowAssembler {
    accumulator: Vec<f32>,
    target: usize,
    carry: usize,
}

impl WindowAssembler {
    pub fn new(audio: &AudioConfig) -> Self {
        Self {
            accumulator: Vec::with_capacity(audio.target_samples() + audio.block_samples),
            target: audio.target_samples(),
            carry: audio.carry_samples(),
        }
    }

    /// Appends one block; emits a window when enough audio accumulated.
    /// Without new blocks no further window is ever produced.
    pub fn push_block(&mut self, block: &AudioBlock) -> Option<SlidingWindow> {
        self.accumulator.extend_from_slice(block.samples());
        if self.accumulator.len() < self.target {
            return None;
        }

        let start = self.accumulator.len() - self.target;
        let window = SlidingWindow(self.accumulator[start..].to_vec());

        let keep_from = self.accumulator.len() - self.carry;
        self.accumulator.drain(..keep_from);

        Some(window)
    }

    /// Samples currently buffered toward the next window.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    fn block(len: usize, value: f32) -> AudioBlock {
        AudioBlock::new(vec![value; len])
    }

    #[test]
    fn queue_evicts_oldest_on_overflow() {
        let queue = IngestQueue::new(3);
        for v in 0..5 {
            assert!(queue.ingest(block(4, v as f32)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_blocks(), 2);

        // Oldest two were discarded; the survivors are blocks 2, 3, 4.
        let first = queue.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.samples()[0], 2.0);
    }

    #[test]
    fn empty_poll_times_out_without_a_block() {
        let queue = IngestQueue::new(3);
        assert!(queue.pop_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn assembler_emits_exact_window_and_carries_one_second() {
        let audio = AudioConfig::new(1_000, 100, 3).unwrap();
        let mut assembler = WindowAssembler::new(&audio);

        let mut window = None;
        for _ in 0..30 {
            if let Some(w) = assembler.push_block(&block(100, 0.1)) {
                window = Some(w);
            }
        }

        let window = window.expect("window after target_samples of blocks");
        assert_eq!(window.len(), audio.target_samples());
        assert_eq!(assembler.buffered(), audio.carry_samples());
    }

    #[test]
    fn assembler_window_holds_most_recent_samples() {
        let audio = AudioConfig::new(1_000, 1_000, 3).unwrap();
        let mut assembler = WindowAssembler::new(&audio);

        let mut window = None;
        for v in 0..4 {
            if let Some(w) = assembler.push_block(&block(1_000, v as f32)) {
                window = Some(w);
            }
        }

        // Four seconds fed; the window is the most recent three.
        let window = window.expect("window emitted");
        assert_eq!(window.samples()[0], 1.0);
        assert_eq!(window.samples()[window.len() - 1], 3.0);
    }

    #[test]
    fn no_second_window_without_new_blocks() {
        let audio = AudioConfig::new(1_000, 500, 3).unwrap();
        let mut assembler = WindowAssembler::new(&audio);

        let mut emitted = 0;
        for _ in 0..6 {
            if assembler.push_block(&block(500, 0.2)).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 1);

        // The carried-over second alone never re-emits.
        assert_eq!(assembler.buffered(), audio.carry_samples());
        for _ in 0..3 {
            assert!(assembler.push_block(&AudioBlock::new(Vec::new())).is_none());
        }
    }
}
