//! Pending command buffer
//!
//! Callers append raw frame bytes from any context; the transceiver task
//! swaps the whole buffer out in one step. Every append posts one wake-up
//! so a busy transceiver still comes back for bytes queued mid-exchange.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

/// Bytes the queue holds before the backlog is thrown away
pub const QUEUE_CAPACITY: usize = 256;

/// Outstanding wake-ups before further ones coalesce
///
/// A drain takes everything queued so far, so a dropped wake-up never
/// strands bytes as long as one is still pending.
pub const WAKE_DEPTH: usize = 16;

/// Bytes taken from the queue in one drain
pub type Batch = Vec<u8, QUEUE_CAPACITY>;

/// Errors reported by [`CommandQueue::drain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// More than [`QUEUE_CAPACITY`] bytes were queued; all of them are gone
    Overrun { dropped: usize },
}

struct QueueState {
    pending: Batch,
    /// Bytes refused since the last drain
    refused: usize,
    overruns: u32,
}

/// Multi-producer, single-consumer byte queue
pub struct CommandQueue<M: RawMutex> {
    state: Mutex<M, RefCell<QueueState>>,
    wake: Channel<M, (), WAKE_DEPTH>,
}

impl<M: RawMutex> Default for CommandQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> CommandQueue<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(QueueState {
                pending: Vec::new(),
                refused: 0,
                overruns: 0,
            })),
            wake: Channel::new(),
        }
    }

    /// Append bytes and post one wake-up; never blocks
    pub fn enqueue(&self, bytes: &[u8]) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            // Once anything is refused the whole backlog is doomed
            if state.refused > 0 || state.pending.extend_from_slice(bytes).is_err() {
                state.refused += bytes.len();
            }
        });

        if self.wake.try_send(()).is_err() {
            trace!("wake-up coalesced");
        }
    }

    /// Take everything queued since the last drain
    ///
    /// After an overrun the caller sees nothing at all, never a prefix.
    pub fn drain(&self) -> Result<Batch, QueueError> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let batch = core::mem::take(&mut state.pending);

            if state.refused > 0 {
                let dropped = batch.len() + state.refused;
                state.refused = 0;
                state.overruns = state.overruns.wrapping_add(1);
                return Err(QueueError::Overrun { dropped });
            }

            Ok(batch)
        })
    }

    /// Wait for the next wake-up
    pub async fn wait(&self) {
        self.wake.receive().await
    }

    /// Bytes currently queued (refused bytes not included)
    pub fn len(&self) -> usize {
        self.state.lock(|state| state.borrow().pending.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overruns reported by [`Self::drain`] so far
    pub fn overruns(&self) -> u32 {
        self.state.lock(|state| state.borrow().overruns)
    }
}
