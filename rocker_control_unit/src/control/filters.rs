//! Encoder velocity mean filter.
//!
//! Moving average over `depth = max(1, EncVMeanFilter)` samples (at most
//! `MAX_VMEAN_DEPTH`). One sample is taken every `max(1, EncVMeanInt / depth)`
//! ticks so the window spans roughly `EncVMeanInt` ticks. The first call
//! always samples.

use rocker_common::consts::MAX_VMEAN_DEPTH;

/// Ring buffer state of the mean filter.
#[derive(Debug, Clone, Copy)]
pub struct VelocityMean {
    buf: [i32; MAX_VMEAN_DEPTH],
    /// Next write position.
    head: usize,
    /// Valid samples.
    len: usize,
    /// Depth the buffer was filled with.
    depth: usize,
    sum: i64,
    /// Ticks until the next sample.
    countdown: u32,
}

impl Default for VelocityMean {
    fn default() -> Self {
        Self {
            buf: [0; MAX_VMEAN_DEPTH],
            head: 0,
            len: 0,
            depth: 1,
            sum: 0,
            countdown: 0,
        }
    }
}

impl VelocityMean {
    /// Reset filter state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed the current velocity; returns the mean after this tick.
    pub fn update(&mut self, velocity: i32, filter: u8, interval: u16) -> i32 {
        let depth = (filter as usize).clamp(1, MAX_VMEAN_DEPTH);
        if depth != self.depth {
            self.reset();
            self.depth = depth;
        }
        if self.countdown == 0 {
            self.push(velocity);
            self.countdown = (interval as u32 / depth as u32).max(1);
        }
        self.countdown -= 1;
        self.mean()
    }

    /// Current mean (0 before the first sample).
    #[inline]
    pub fn mean(&self) -> i32 {
        if self.len == 0 {
            0
        } else {
            (self.sum / self.len as i64) as i32
        }
    }

    fn push(&mut self, v: i32) {
        if self.len == self.depth {
            self.sum -= self.buf[self.head] as i64;
        } else {
            self.len += 1;
        }
        self.buf[self.head] = v;
        self.sum += v as i64;
        self.head = (self.head + 1) % self.depth;
    }
}
