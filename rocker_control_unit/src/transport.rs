//! Frame hand-off between the receive context and the scheduler.
//!
//! The receive side (interrupt handler on hardware, script feeder in the
//! runner) owns a [`FrameProducer`]; the scheduler owns the matching
//! [`FrameConsumer`] through a [`QueuedTransport`]. The queue is a bounded
//! lock-free SPSC ring.
//!
//! ## Overflow
//! Drop newest: a push into a full queue rejects the new frame and bumps the
//! dropped counter. Queued frames are never overwritten.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};
use tracing::debug;

use rocker_common::consts::{FRAME_QUEUE_SLOTS, MAX_FRAMES_PER_TICK};
use rocker_common::error::TransportError;
use rocker_common::protocol::WireFrame;

// One queue holds at least a full tick batch.
static_assertions::const_assert!(FRAME_QUEUE_SLOTS - 1 >= MAX_FRAMES_PER_TICK);

// ─── Transport Boundary ─────────────────────────────────────────────

/// Frame transport as seen by the scheduler.
pub trait Transport {
    type Frame: WireFrame;

    /// Queue one outbound frame. Never blocks.
    fn send(&mut self, frame: &Self::Frame) -> Result<(), TransportError>;

    /// Take the next inbound frame, if any.
    fn try_receive(&mut self) -> Option<Self::Frame>;

    /// Inbound frames lost to overflow since start.
    fn dropped_frames(&self) -> u32 {
        0
    }
}

/// Outbound side of a transport.
pub trait FrameSink<F> {
    fn push_frame(&mut self, frame: F) -> Result<(), TransportError>;
}

impl<F> FrameSink<F> for std::vec::Vec<F> {
    fn push_frame(&mut self, frame: F) -> Result<(), TransportError> {
        self.push(frame);
        Ok(())
    }
}

/// Fixed-size transmit buffer; full means `TxFull`.
impl<F, const N: usize> FrameSink<F> for heapless::Vec<F, N> {
    fn push_frame(&mut self, frame: F) -> Result<(), TransportError> {
        self.push(frame).map_err(|_| TransportError::TxFull)
    }
}

// ─── Frame Queue ────────────────────────────────────────────────────

/// Bounded inbound queue with `N - 1` usable slots.
pub struct FrameQueue<F, const N: usize = FRAME_QUEUE_SLOTS> {
    queue: Queue<F, N>,
    dropped: AtomicU32,
}

impl<F, const N: usize> FrameQueue<F, N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Usable slots.
    pub const fn capacity() -> usize {
        N - 1
    }

    /// Split into the receive-context and scheduler halves.
    pub fn split(&mut self) -> (FrameProducer<'_, F, N>, FrameConsumer<'_, F, N>) {
        let (tx, rx) = self.queue.split();
        let dropped = &self.dropped;
        (
            FrameProducer { tx, dropped },
            FrameConsumer { rx, dropped },
        )
    }
}

impl<F, const N: usize> Default for FrameQueue<F, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-context half.
pub struct FrameProducer<'a, F, const N: usize> {
    tx: Producer<'a, F, N>,
    dropped: &'a AtomicU32,
}

impl<F, const N: usize> FrameProducer<'_, F, N> {
    /// Enqueue `frame`. Returns `false` when the queue was full and the
    /// frame was dropped.
    pub fn push(&mut self, frame: F) -> bool {
        match self.tx.enqueue(frame) {
            Ok(()) => true,
            Err(_) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                debug!(dropped = total, "frame queue full, frame dropped");
                false
            }
        }
    }
}

/// Scheduler half.
pub struct FrameConsumer<'a, F, const N: usize> {
    rx: Consumer<'a, F, N>,
    dropped: &'a AtomicU32,
}

impl<F, const N: usize> FrameConsumer<'_, F, N> {
    #[inline]
    pub fn pop(&mut self) -> Option<F> {
        self.rx.dequeue()
    }

    /// Frames waiting.
    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ─── Queued Transport ───────────────────────────────────────────────

/// [`Transport`] over a frame queue and an outbound sink.
pub struct QueuedTransport<'a, F, S, const N: usize = FRAME_QUEUE_SLOTS> {
    rx: FrameConsumer<'a, F, N>,
    tx: S,
}

impl<'a, F, S, const N: usize> QueuedTransport<'a, F, S, N> {
    pub fn new(rx: FrameConsumer<'a, F, N>, tx: S) -> Self {
        Self { rx, tx }
    }

    /// Outbound frames, for inspection.
    pub fn sink(&self) -> &S {
        &self.tx
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.tx
    }

    /// Frames waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl<F, S, const N: usize> Transport for QueuedTransport<'_, F, S, N>
where
    F: WireFrame + Copy,
    S: FrameSink<F>,
{
    type Frame = F;

    fn send(&mut self, frame: &F) -> Result<(), TransportError> {
        self.tx.push_frame(*frame)
    }

    fn try_receive(&mut self) -> Option<F> {
        self.rx.pop()
    }

    fn dropped_frames(&self) -> u32 {
        self.rx.dropped()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
