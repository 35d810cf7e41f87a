//! Correlated reads
//!
//! A read reply only identifies itself by the VP it echoes. Each
//! [`Transceiver::query`] claims a slot keyed by that VP before its frame
//! is queued; the transceiver hands every read reply to the oldest slot
//! still waiting for the same address. The returned [`PendingQuery`] is the
//! completion handle and frees its slot when dropped.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};

use dgus_hal::SerialPort;
use dgus_protocol::FrameView;

use crate::transceiver::{LinkError, Response, Transceiver};

/// Reads that may be outstanding at once
pub const MAX_PENDING_QUERIES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Waiting { seq: u32, vp: u16 },
    Done,
}

struct Slots {
    slots: [Slot; MAX_PENDING_QUERIES],
    next_seq: u32,
}

pub(crate) struct QueryTable<M: RawMutex> {
    slots: Mutex<M, RefCell<Slots>>,
    replies: [Signal<M, Response>; MAX_PENDING_QUERIES],
}

impl<M: RawMutex> QueryTable<M> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Slots {
                slots: [Slot::Free; MAX_PENDING_QUERIES],
                next_seq: 0,
            })),
            replies: [const { Signal::new() }; MAX_PENDING_QUERIES],
        }
    }

    /// Claim a slot for a reply from `vp`
    fn register(&self, vp: u16) -> Result<(usize, u32), LinkError> {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let index = slots
                .slots
                .iter()
                .position(|slot| *slot == Slot::Free)
                .ok_or(LinkError::QueryTableFull)?;

            let seq = slots.next_seq;
            slots.next_seq = seq.wrapping_add(1);
            slots.slots[index] = Slot::Waiting { seq, vp };
            self.replies[index].reset();
            Ok((index, seq))
        })
    }

    /// Deliver `frame` to the oldest query waiting on `vp`
    ///
    /// The reply is signalled before the slot lock is dropped, so a slot
    /// released and claimed again in between never sees it.
    pub(crate) fn complete(&self, vp: u16, frame: &[u8]) -> bool {
        let mut reply = Response::new();
        // A frame split from a reply never exceeds the reply buffer
        let _ = reply.extend_from_slice(frame);

        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let next_seq = slots.next_seq;
            let oldest = slots
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| match slot {
                    Slot::Waiting { seq, vp: addr } if *addr == vp => {
                        Some((i, next_seq.wrapping_sub(*seq)))
                    }
                    _ => None,
                })
                // Largest distance from the counter is the oldest
                .max_by_key(|(_, age)| *age)
                .map(|(i, _)| i);

            let Some(index) = oldest else {
                return false;
            };
            slots.slots[index] = Slot::Done;
            self.replies[index].signal(reply);
            true
        })
    }

    fn release(&self, index: usize) {
        self.slots.lock(|slots| {
            slots.borrow_mut().slots[index] = Slot::Free;
            self.replies[index].reset();
        });
    }

    /// Queries not yet released
    pub(crate) fn outstanding(&self) -> usize {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .slots
                .iter()
                .filter(|slot| **slot != Slot::Free)
                .count()
        })
    }
}

/// Completion handle for one correlated read
pub struct PendingQuery<'a, M: RawMutex, P: SerialPort> {
    link: &'a Transceiver<M, P>,
    slot: usize,
    token: u32,
    vp: u16,
}

impl<M: RawMutex, P: SerialPort> PendingQuery<'_, M, P> {
    /// Correlation token, unique among recent queries
    pub fn token(&self) -> u32 {
        self.token
    }

    /// Address the reply must echo
    pub fn address(&self) -> u16 {
        self.vp
    }

    /// Wait for the reply frame
    pub async fn response(self, timeout: Duration) -> Result<Response, LinkError> {
        with_timeout(timeout, self.link.queries.replies[self.slot].wait())
            .await
            .map_err(|_| LinkError::ResponseTimeout)
    }
}

impl<M: RawMutex, P: SerialPort> Drop for PendingQuery<'_, M, P> {
    fn drop(&mut self) {
        self.link.queries.release(self.slot);
    }
}

impl<M: RawMutex, P: SerialPort> Transceiver<M, P> {
    /// Queue a read frame and get a handle to its reply
    ///
    /// The slot is claimed before the frame is queued, so a fast reply
    /// cannot be missed.
    pub fn query(&self, frame: &[u8]) -> Result<PendingQuery<'_, M, P>, LinkError> {
        let view = FrameView::parse(frame)?;
        if !view.is_read() {
            return Err(LinkError::NotAReadCommand);
        }

        let vp = view.address();
        let (slot, token) = self.queries.register(vp)?;
        trace!("query {} registered for {=u16:#x}", token, vp);
        self.enqueue(frame);

        Ok(PendingQuery {
            link: self,
            slot,
            token,
            vp,
        })
    }

    /// Queue a read frame and wait for its reply
    pub async fn read(&self, frame: &[u8], timeout: Duration) -> Result<Response, LinkError> {
        self.query(frame)?.response(timeout).await
    }

    /// Correlated reads currently holding a slot
    pub fn pending_queries(&self) -> usize {
        self.queries.outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::mock::{run_link, SimDisplay, TestLink};
    use dgus_protocol::{commands, FrameError, ReadResponse};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn reply(vp: u16, value: u16) -> [u8; 9] {
        let [hi, lo] = vp.to_be_bytes();
        let [v_hi, v_lo] = value.to_be_bytes();
        [0x5A, 0xA5, 0x06, 0x83, hi, lo, 0x01, v_hi, v_lo]
    }

    #[test]
    fn test_query_receives_its_own_reply() {
        let sim = SimDisplay::new();
        sim.reply_to(0x1000, &reply(0x1000, 42));
        let link = TestLink::new(sim, LinkConfig::new());

        let response = run_link(&link, async {
            link.read(&commands::read_words(0x1000, 1), TIMEOUT).await
        })
        .unwrap();

        let decoded = ReadResponse::for_address(&response, 0x1000).unwrap();
        assert_eq!(decoded.as_u16(), Ok(42));
        assert_eq!(link.pending_queries(), 0);
    }

    #[test]
    fn test_interleaved_queries_are_not_crossed() {
        let sim = SimDisplay::new();
        sim.reply_to(0x1000, &reply(0x1000, 1));
        sim.reply_to(0x2000, &reply(0x2000, 2));
        let link = TestLink::new(sim, LinkConfig::new());

        let (first, second) = run_link(&link, async {
            let first = link.query(&commands::read_words(0x1000, 1)).unwrap();
            let second = link.query(&commands::read_words(0x2000, 1)).unwrap();
            assert_ne!(first.token(), second.token());

            // Collect in the opposite order
            let second = second.response(TIMEOUT).await;
            let first = first.response(TIMEOUT).await;
            (first, second)
        });

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(ReadResponse::parse(&first).unwrap().as_u16(), Ok(1));
        assert_eq!(ReadResponse::parse(&second).unwrap().as_u16(), Ok(2));
    }

    #[test]
    fn test_same_address_completes_oldest_first() {
        let sim = SimDisplay::new();
        sim.reply_to(0x1000, &reply(0x1000, 9));
        let link = TestLink::new(sim, LinkConfig::new());

        let (first, second) = run_link(&link, async {
            let first = link.query(&commands::read_words(0x1000, 1)).unwrap();
            let second = link.query(&commands::read_words(0x1000, 1)).unwrap();
            (first.response(TIMEOUT).await, second.response(TIMEOUT).await)
        });

        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn test_query_times_out_and_frees_slot() {
        let sim = SimDisplay::new();
        let link = TestLink::new(sim, LinkConfig::new());

        let result = run_link(&link, async {
            link.read(&commands::read_words(0x1000, 1), TIMEOUT).await
        });

        assert_eq!(result, Err(LinkError::ResponseTimeout));
        assert_eq!(link.pending_queries(), 0);
    }

    #[test]
    fn test_query_table_full() {
        let link = TestLink::new(SimDisplay::new(), LinkConfig::new());
        let frame = commands::read_words(0x1000, 1);

        let held: std::vec::Vec<_> = (0..MAX_PENDING_QUERIES)
            .map(|_| link.query(&frame).unwrap())
            .collect();

        assert_eq!(link.query(&frame).err(), Some(LinkError::QueryTableFull));
        drop(held);
        assert!(link.query(&frame).is_ok());
    }

    #[test]
    fn test_query_rejects_write_frames() {
        let link = TestLink::new(SimDisplay::new(), LinkConfig::new());

        assert_eq!(
            link.query(&commands::write_u16(0x1000, 1)).err(),
            Some(LinkError::NotAReadCommand)
        );
        assert_eq!(
            link.query(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]).err(),
            Some(LinkError::Malformed(FrameError::BadMarker))
        );
        assert!(link.queue.is_empty());
    }

    #[test]
    fn test_reply_without_query_is_ignored() {
        let link = TestLink::new(SimDisplay::new(), LinkConfig::new());
        assert!(!link.queries.complete(0x1000, &reply(0x1000, 1)));
    }

    #[test]
    fn test_reused_slot_does_not_see_previous_reply() {
        let link = TestLink::new(SimDisplay::new(), LinkConfig::new());
        let frame = commands::read_words(0x1000, 1);

        let first = link.query(&frame).unwrap();
        assert!(link.queries.complete(0x1000, &reply(0x1000, 1)));
        drop(first);

        let second = link.query(&frame).unwrap();
        let result = embassy_futures::block_on(second.response(Duration::from_millis(10)));
        assert_eq!(result, Err(LinkError::ResponseTimeout));
    }
}
