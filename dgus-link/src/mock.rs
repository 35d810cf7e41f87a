//! Simulated display for host tests

use core::future::Future;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embassy_futures::block_on;
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;

use dgus_hal::SerialPort;
use dgus_protocol::{OP_READ, OP_WRITE};

use crate::transceiver::Transceiver;

pub type TestLink = Transceiver<CriticalSectionRawMutex, SimDisplay>;

/// What the display sends after accepting a write
pub const WRITE_ACK: [u8; 6] = [0x5A, 0xA5, 0x03, 0x82, 0x4F, 0x4B];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

#[derive(Default)]
struct SimState {
    rx: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    replies: Vec<(u16, Vec<u8>)>,
    ack_writes: bool,
    fail_writes: bool,
}

/// Display that answers read frames from a canned table
///
/// Clones share state so a test can keep a handle after the port moves
/// into the transceiver.
#[derive(Clone, Default)]
pub struct SimDisplay {
    state: Rc<RefCell<SimState>>,
}

impl SimDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `bytes` whenever a read for `vp` is written
    pub fn reply_to(&self, vp: u16, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.replies.retain(|(addr, _)| *addr != vp);
        state.replies.push((vp, bytes.to_vec()));
    }

    /// Answer every write frame with `OK`
    pub fn acknowledge_writes(&self, enabled: bool) {
        self.state.borrow_mut().ack_writes = enabled;
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.state.borrow_mut().fail_writes = enabled;
    }

    /// Bytes arriving unprompted
    pub fn push_input(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn has_input(&self) -> bool {
        !self.state.borrow().rx.is_empty()
    }

    /// Every frame accepted so far, in write order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.borrow().written.clone()
    }

    pub fn clear_written(&self) {
        self.state.borrow_mut().written.clear();
    }
}

impl SerialPort for SimDisplay {
    type Error = SimError;

    fn input_available(&mut self) -> Result<bool, SimError> {
        Ok(self.has_input())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, SimError> {
        Ok(self.state.borrow_mut().rx.pop_front())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(SimError);
        }
        state.written.push(data.to_vec());

        match data.get(3) {
            Some(&OP_READ) if data.len() >= 6 => {
                let vp = u16::from_be_bytes([data[4], data[5]]);
                let reply = state
                    .replies
                    .iter()
                    .find(|(addr, _)| *addr == vp)
                    .map(|(_, bytes)| bytes.clone());
                if let Some(reply) = reply {
                    state.rx.extend(reply);
                }
            }
            Some(&OP_WRITE) if state.ack_writes => state.rx.extend(WRITE_ACK),
            _ => {}
        }
        Ok(())
    }
}

/// Run `body` alongside both link tasks and return its output
pub fn run_link<T>(link: &TestLink, body: impl Future<Output = T>) -> T {
    match block_on(select3(link.run(), link.run_blink(), body)) {
        Either3::First(never) | Either3::Second(never) => never,
        Either3::Third(out) => out,
    }
}

/// Wait until at least `count` frames have been written
pub async fn settle(sim: &SimDisplay, count: usize) {
    for _ in 0..2000 {
        if sim.written().len() >= count {
            return;
        }
        Timer::after_millis(1).await;
    }
    panic!("display saw {} writes, expected {}", sim.written().len(), count);
}
