//! Blink scheduler
//!
//! Each blinking element carries its own period and phase. One task,
//! [`Transceiver::run_blink`], sleeps until the earliest toggle is due and
//! writes the show/hide frame straight to the port under the serial-access
//! lock, skipping the command queue.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;

use dgus_hal::SerialPort;
use dgus_protocol::{commands, Target};

use crate::transceiver::Transceiver;

/// Elements that can blink at the same time
pub const MAX_BLINK_TARGETS: usize = 4;

/// Errors from starting a blink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkError {
    /// Already blinking [`MAX_BLINK_TARGETS`] elements
    TableFull,
    /// A zero period would toggle continuously
    ZeroPeriod,
}

#[derive(Debug, Clone, Copy)]
struct Blinker {
    target: Target,
    period: Duration,
    visible: bool,
    next_toggle: Instant,
}

type Blinkers = Vec<Blinker, MAX_BLINK_TARGETS>;

pub(crate) struct BlinkSet<M: RawMutex> {
    active: Mutex<M, RefCell<Blinkers>>,
    changed: Signal<M, ()>,
}

impl<M: RawMutex> BlinkSet<M> {
    pub(crate) const fn new() -> Self {
        Self {
            active: Mutex::new(RefCell::new(Vec::new())),
            changed: Signal::new(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Blinkers) -> R) -> R {
        self.active.lock(|active| f(&mut active.borrow_mut()))
    }

    fn contains(&self, target: Target) -> bool {
        self.with(|active| active.iter().any(|b| b.target == target))
    }

    fn next_due(&self) -> Option<Instant> {
        self.with(|active| active.iter().map(|b| b.next_toggle).min())
    }

    /// Flip every blinker that is due and return the frames to write
    fn advance(&self, now: Instant) -> Vec<(Target, bool), MAX_BLINK_TARGETS> {
        self.with(|active| {
            let mut due = Vec::new();
            for blinker in active.iter_mut().filter(|b| b.next_toggle <= now) {
                blinker.visible = !blinker.visible;
                blinker.next_toggle += blinker.period;
                if blinker.next_toggle <= now {
                    // Fell behind; skip the missed toggles
                    blinker.next_toggle = now + blinker.period;
                }
                let _ = due.push((blinker.target, blinker.visible));
            }
            due
        })
    }
}

impl<M: RawMutex, P: SerialPort> Transceiver<M, P> {
    /// Start blinking `target`, toggling every `period`
    ///
    /// The first toggle hides the element one period from now. Starting an
    /// element that already blinks restarts its timer with the new period.
    pub fn start_blink(&self, target: Target, period: Duration) -> Result<(), BlinkError> {
        if period == Duration::from_ticks(0) {
            return Err(BlinkError::ZeroPeriod);
        }

        let next_toggle = Instant::now() + period;
        self.blink.with(|active| {
            if let Some(blinker) = active.iter_mut().find(|b| b.target == target) {
                blinker.period = period;
                blinker.next_toggle = next_toggle;
                return Ok(());
            }

            active
                .push(Blinker {
                    target,
                    period,
                    visible: true,
                    next_toggle,
                })
                .map_err(|_| {
                    warn!("blink table full");
                    BlinkError::TableFull
                })
        })?;

        self.blink.changed.signal(());
        Ok(())
    }

    /// Start blinking with the configured default period
    pub fn start_blink_default(&self, target: Target) -> Result<(), BlinkError> {
        self.start_blink(target, self.config.blink_period())
    }

    /// Change the period of a blinking element and restart its timer
    ///
    /// Returns `false` if the element is not blinking or `period` is zero.
    pub fn set_blink_period(&self, target: Target, period: Duration) -> bool {
        if period == Duration::from_ticks(0) || !self.is_blinking(target) {
            return false;
        }
        self.start_blink(target, period).is_ok()
    }

    pub fn is_blinking(&self, target: Target) -> bool {
        self.blink.contains(target)
    }

    /// Elements currently blinking
    pub fn blink_count(&self) -> usize {
        self.blink.with(|active| active.len())
    }

    /// Stop blinking `target` and leave it visible
    ///
    /// The show frame is written even if the element was not blinking.
    /// Returns whether it was.
    pub async fn stop_blink(&self, target: Target) -> bool {
        let was_blinking = self.blink.with(|active| {
            match active.iter().position(|b| b.target == target) {
                Some(index) => {
                    active.swap_remove(index);
                    true
                }
                None => false,
            }
        });
        self.blink.changed.signal(());

        let mut port = self.serial.lock().await;
        if port.discard_input().is_err() {
            warn!("serial read failed while discarding");
        }
        if port.write_all(&commands::show(target)).is_err() {
            warn!("serial write failed");
        }

        was_blinking
    }

    /// Blink task body
    pub async fn run_blink(&self) -> ! {
        info!("blink scheduler started");

        loop {
            let Some(due) = self.blink.next_due() else {
                self.blink.changed.wait().await;
                continue;
            };

            match select(Timer::at(due), self.blink.changed.wait()).await {
                Either::First(()) => self.toggle_due().await,
                Either::Second(()) => {}
            }
        }
    }

    async fn toggle_due(&self) {
        for (target, visible) in self.blink.advance(Instant::now()) {
            let mut port = self.serial.lock().await;
            // Stopped while waiting for the port; the stop wrote show
            if !self.is_blinking(target) {
                continue;
            }
            if port
                .write_all(&commands::visibility(target, visible))
                .is_err()
            {
                warn!("serial write failed");
            }
        }
    }
}
