//! Serial transceiver task
//!
//! The transceiver is the only code that writes ordinary traffic to the
//! display and reads its replies. Callers queue frames with
//! [`Transceiver::enqueue`]; [`Transceiver::run`] drains the queue, writes
//! one frame at a time, listens briefly for a reply and publishes it.
//!
//! The serial-access lock is held for a single write or a single drain of
//! the receive buffer, never while waiting for a reply, so the blink
//! scheduler can slip its toggles in between.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_deadline, Duration, Instant, Timer};
use heapless::Vec;

use dgus_hal::SerialPort;
use dgus_protocol::{split, Chunk, FrameError, Framing, ReadResponse, MIN_FRAME_LEN};

use crate::blink::BlinkSet;
use crate::config::LinkConfig;
use crate::echo::{Exchange, ECHO_DEPTH};
use crate::query::QueryTable;
use crate::queue::{CommandQueue, QueueError};

/// Largest reply kept from one exchange
pub const RESPONSE_CAPACITY: usize = 256;

/// Bytes captured after one write
pub type Response = Vec<u8, RESPONSE_CAPACITY>;

/// Errors surfaced to callers of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No reply arrived in time, or the exchange captured nothing
    ResponseTimeout,
    /// Every correlated query slot is in use
    QueryTableFull,
    /// Only read (0x83) frames can be correlated
    NotAReadCommand,
    /// Frame header did not validate
    Malformed(FrameError),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        LinkError::Malformed(e)
    }
}

/// Shared response slot
struct ResponseSlot {
    bytes: Response,
    /// Exchanges completed so far
    exchanges: u32,
}

/// Owner of one serial link to a display
///
/// Place it in a `static` (or a `StaticCell`) and run [`Self::run`] and
/// [`Self::run_blink`] as two tasks. Everything else may be called from
/// any task.
pub struct Transceiver<M: RawMutex, P: SerialPort> {
    pub(crate) config: LinkConfig,
    /// Serial-access lock
    pub(crate) serial: Mutex<M, P>,
    pub(crate) queue: CommandQueue<M>,
    /// Most recent reply, last writer wins
    response: BlockingMutex<M, RefCell<ResponseSlot>>,
    response_ready: Signal<M, ()>,
    pub(crate) queries: QueryTable<M>,
    pub(crate) blink: BlinkSet<M>,
    echo_enabled: BlockingMutex<M, Cell<bool>>,
    echo: Channel<M, Exchange, ECHO_DEPTH>,
}

impl<M: RawMutex, P: SerialPort> Transceiver<M, P> {
    pub const fn new(port: P, config: LinkConfig) -> Self {
        Self {
            config,
            serial: Mutex::new(port),
            queue: CommandQueue::new(),
            response: BlockingMutex::new(RefCell::new(ResponseSlot {
                bytes: Vec::new(),
                exchanges: 0,
            })),
            response_ready: Signal::new(),
            queries: QueryTable::new(),
            blink: BlinkSet::new(),
            echo_enabled: BlockingMutex::new(Cell::new(false)),
            echo: Channel::new(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Queue frame bytes for transmission; never blocks
    ///
    /// Several frames may be passed in one call. Bytes that do not start
    /// with the frame marker are dropped when the batch is split.
    pub fn enqueue(&self, frame: &[u8]) {
        self.queue.enqueue(frame);
    }

    /// Overruns seen by the transceiver so far
    pub fn overruns(&self) -> u32 {
        self.queue.overruns()
    }

    /// Wait for the next exchange that captures a reply and return it
    ///
    /// Only exchanges completed after the call count, and exchanges that
    /// captured nothing (most writes) are skipped. The reply is not
    /// necessarily the one for the caller's own frame, and only one waiter
    /// is released per exchange. Check the echoed address before trusting
    /// the payload, or use [`Self::query`] instead.
    pub async fn await_response(&self, timeout: Duration) -> Result<Response, LinkError> {
        let deadline = Instant::now() + timeout;
        let seen = self.exchanges();

        loop {
            // A stale signal from an earlier exchange just costs a retry
            with_deadline(deadline, self.response_ready.wait())
                .await
                .map_err(|_| LinkError::ResponseTimeout)?;

            let fresh = self.response.lock(|slot| {
                let slot = slot.borrow();
                (slot.exchanges != seen && !slot.bytes.is_empty()).then(|| slot.bytes.clone())
            });
            if let Some(response) = fresh {
                return Ok(response);
            }
        }
    }

    /// Copy of the most recent reply
    pub fn last_response(&self) -> Response {
        self.response.lock(|slot| slot.borrow().bytes.clone())
    }

    /// Exchanges completed since start, wrapping
    pub fn exchanges(&self) -> u32 {
        self.response.lock(|slot| slot.borrow().exchanges)
    }

    /// Publish exchange records on [`Self::echo_events`]
    pub fn set_echo(&self, enabled: bool) {
        self.echo_enabled.lock(|echo| echo.set(enabled));
    }

    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled.lock(|echo| echo.get())
    }

    /// Receiver for exchange records
    pub fn echo_events(&self) -> Receiver<'_, M, Exchange, ECHO_DEPTH> {
        self.echo.receiver()
    }

    /// Transceiver task body
    pub async fn run(&self) -> ! {
        info!("transceiver started");

        loop {
            self.queue.wait().await;

            let batch = match self.queue.drain() {
                Ok(batch) => batch,
                Err(QueueError::Overrun { dropped }) => {
                    warn!("command queue overrun, dropped {} bytes", dropped);
                    continue;
                }
            };

            if batch.len() < MIN_FRAME_LEN {
                if !batch.is_empty() {
                    trace!("ignoring {} stray bytes", batch.len());
                }
                continue;
            }

            for chunk in split(&batch, self.config.framing) {
                match chunk {
                    Chunk::Frame(frame) => self.exchange(frame).await,
                    Chunk::Discarded(bytes) => {
                        debug!("discarding {} unframed bytes", bytes.len());
                    }
                }
            }
        }
    }

    /// Write one frame, collect the reply and hand it out
    async fn exchange(&self, frame: &[u8]) {
        {
            let mut port = self.serial.lock().await;
            if port.write_all(frame).is_err() {
                warn!("serial write failed");
            }
        }

        if !self.wait_for_input().await {
            // Many writes have no reply
            trace!("no reply after {} polls", self.config.response_polls);
        }

        self.response.lock(|slot| slot.borrow_mut().bytes.clear());
        let rx = self.read_available().await;
        self.response.lock(|slot| {
            let mut slot = slot.borrow_mut();
            slot.bytes.clone_from(&rx);
            slot.exchanges = slot.exchanges.wrapping_add(1);
        });

        self.response_ready.signal(());
        self.complete_queries(&rx);

        if self.echo_enabled() {
            self.publish(frame, rx);
        } else {
            let mut port = self.serial.lock().await;
            if port.discard_input().is_err() {
                warn!("serial read failed while discarding");
            }
        }
    }

    /// Poll the receive line without holding the lock in between
    async fn wait_for_input(&self) -> bool {
        let interval = self.config.poll_interval();
        for _ in 0..self.config.response_polls {
            if self.input_available().await {
                return true;
            }
            Timer::after(interval).await;
        }
        self.input_available().await
    }

    async fn input_available(&self) -> bool {
        let mut port = self.serial.lock().await;
        port.input_available().unwrap_or_else(|_| {
            warn!("serial status read failed");
            false
        })
    }

    /// Drain every byte currently buffered by the port
    async fn read_available(&self) -> Response {
        let mut rx = Response::new();
        let mut overflow = 0usize;

        let mut port = self.serial.lock().await;
        loop {
            match port.read_byte() {
                Ok(Some(byte)) => {
                    if rx.push(byte).is_err() {
                        overflow += 1;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("serial read failed");
                    break;
                }
            }
        }
        drop(port);

        if overflow > 0 {
            warn!("reply overflow, dropped {} bytes", overflow);
        }
        rx
    }

    /// Hand read replies to the queries waiting for their address
    fn complete_queries(&self, rx: &[u8]) {
        for frame in split(rx, Framing::Marker).frames() {
            if let Ok(reply) = ReadResponse::parse(frame) {
                if !self.queries.complete(reply.address(), frame) {
                    trace!("reply for {=u16:#x} has no waiting query", reply.address());
                }
            }
        }
    }

    fn publish(&self, frame: &[u8], rx: Response) {
        let mut tx = Vec::new();
        if tx.extend_from_slice(frame).is_err() {
            return;
        }
        if self.echo.try_send(Exchange { tx, rx }).is_err() {
            warn!("echo channel full, dropping exchange record");
        }
    }
}
