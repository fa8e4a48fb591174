//! Simulated SMBus controller with an echo device attached, for host tests.
//!
//! The model follows the NPCX SMB block closely enough to exercise the driver: SDAST is raised
//! whenever the data register needs service, STOP completes on the next data register access,
//! received bytes are clocked in as soon as the previous one has been read, and disabling the
//! module resets its bus state machine.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::{IoMode, PinSet, Registers, Status, Timing};

/// Register level event, recorded in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Event {
    Start,
    Stop,
    Nack,
    Write(u8),
    Read(u8),
    ClearStatus(u8),
    ClearBusBusy,
    Interrupts(bool),
    Enabled(bool),
    Timing(Timing),
    PinSet(PinSet),
    Io(PinSet, IoMode),
    RawMode(bool),
    Scl(bool),
    Sda(bool),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Idle,
    Address,
    Transmit,
    Receive,
    Nacked,
}

struct Inner {
    events: Vec<Event>,
    enabled: bool,
    interrupts: bool,
    phase: Phase,
    bus_busy: bool,
    start_requested: bool,
    stop_requested: bool,
    nack_armed: bool,
    sdast: bool,
    ber: bool,
    negack: bool,
    data: u8,
    // attached device
    device_address: Option<u8>,
    fifo: VecDeque<u8>,
    // fault injection
    wedged: bool,
    hold_stop: bool,
    bus_error_after: Option<usize>,
    payload_bytes: usize,
    sda_stuck_clocks: u8,
    // raw pin mode
    raw: bool,
    scl_low: bool,
    sda_low: bool,
}

impl Inner {
    fn complete_stop(&mut self) {
        self.stop_requested = false;
        self.phase = Phase::Idle;
        self.bus_busy = false;
        self.sdast = false;
        self.nack_armed = false;
    }

    fn count_payload(&mut self) -> bool {
        self.payload_bytes += 1;
        if self.bus_error_after.is_some_and(|n| self.payload_bytes >= n) {
            self.bus_error_after = None;
            self.ber = true;
            self.sdast = false;
            return false;
        }
        true
    }

    fn clock_in_next(&mut self) {
        self.data = self.fifo.pop_front().unwrap_or(0xff);
        self.nack_armed = false;
        if self.count_payload() {
            self.sdast = true;
        }
    }

    fn address_byte(&mut self, byte: u8) {
        self.start_requested = false;
        if self.device_address != Some(byte >> 1) {
            self.phase = Phase::Nacked;
            self.negack = true;
            return;
        }
        if byte & 1 == 1 {
            self.phase = Phase::Receive;
            self.clock_in_next();
        } else {
            self.phase = Phase::Transmit;
            self.sdast = true;
        }
    }
}

pub(crate) struct SimSmb {
    inner: Mutex<Inner>,
}

impl SimSmb {
    /// Controller with an echo device at 7-bit `address`.
    pub(crate) fn new(address: u8) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: Vec::new(),
                enabled: false,
                interrupts: false,
                phase: Phase::Idle,
                bus_busy: false,
                start_requested: false,
                stop_requested: false,
                nack_armed: false,
                sdast: false,
                ber: false,
                negack: false,
                data: 0,
                device_address: Some(address),
                fifo: VecDeque::new(),
                wedged: false,
                hold_stop: false,
                bus_error_after: None,
                payload_bytes: 0,
                sda_stuck_clocks: 0,
                raw: false,
                scl_low: false,
                sda_low: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the controller would raise its interrupt right now.
    pub(crate) fn irq_pending(&self) -> bool {
        let inner = self.lock();
        inner.enabled && inner.interrupts && (inner.sdast || inner.ber || inner.negack)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub(crate) fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    pub(crate) fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Controller never answers a START until the module is disabled.
    pub(crate) fn wedge(&self) {
        self.lock().wedged = true;
    }

    /// Raise BER once `bytes` payload bytes have moved.
    pub(crate) fn bus_error_after(&self, bytes: usize) {
        let mut inner = self.lock();
        inner.payload_bytes = 0;
        inner.bus_error_after = Some(bytes);
    }

    /// Device keeps SDA low until SCL has been clocked `clocks` times.
    pub(crate) fn hold_sda_low(&self, clocks: u8) {
        let mut inner = self.lock();
        inner.sda_stuck_clocks = clocks;
        inner.bus_busy = true;
    }

    /// STOP requests never complete.
    pub(crate) fn hold_stop(&self) {
        self.lock().hold_stop = true;
    }

    /// Bytes the device has queued for the next read.
    pub(crate) fn queued(&self) -> Vec<u8> {
        self.lock().fifo.iter().copied().collect()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub(crate) fn interrupts_enabled(&self) -> bool {
        self.lock().interrupts
    }
}

impl Registers for SimSmb {
    fn generate_start(&self) {
        let mut inner = self.lock();
        inner.events.push(Event::Start);
        inner.start_requested = true;
        if inner.wedged || !inner.enabled {
            return;
        }
        inner.bus_busy = true;
        inner.phase = Phase::Address;
        inner.sdast = true;
    }

    fn generate_stop(&self) {
        let mut inner = self.lock();
        inner.events.push(Event::Stop);
        inner.stop_requested = true;
        if inner.hold_stop {
            return;
        }
        // nothing in flight on the bus: STOP goes out immediately
        if inner.ber || inner.negack || matches!(inner.phase, Phase::Idle | Phase::Nacked | Phase::Address) {
            inner.complete_stop();
        }
    }

    fn stop_pending(&self) -> bool {
        self.lock().stop_requested
    }

    fn arm_nack(&self) {
        let mut inner = self.lock();
        inner.events.push(Event::Nack);
        inner.nack_armed = true;
    }

    fn write_data(&self, byte: u8) {
        let mut inner = self.lock();
        inner.events.push(Event::Write(byte));
        inner.sdast = false;

        if inner.start_requested && matches!(inner.phase, Phase::Address | Phase::Transmit | Phase::Receive) {
            inner.address_byte(byte);
        } else if inner.stop_requested {
            if !inner.hold_stop {
                inner.complete_stop();
            }
        } else if inner.phase == Phase::Transmit {
            inner.fifo.push_back(byte);
            if inner.count_payload() {
                inner.sdast = true;
            }
        }
    }

    fn read_data(&self) -> u8 {
        let mut inner = self.lock();
        let data = inner.data;
        inner.events.push(Event::Read(data));
        inner.sdast = false;

        if inner.stop_requested {
            if !inner.hold_stop {
                inner.complete_stop();
            }
        } else if inner.phase == Phase::Receive {
            inner.clock_in_next();
        }
        data
    }

    fn status(&self) -> Status {
        let inner = self.lock();
        let mut status = Status::empty();
        if inner.sdast {
            status = status | Status::SDAST;
        }
        if inner.ber {
            status = status | Status::BER;
        }
        if inner.negack {
            status = status | Status::NEGACK;
        }
        status
    }

    fn clear_status(&self, flags: Status) {
        let mut inner = self.lock();
        inner.events.push(Event::ClearStatus(flags.bits()));
        if flags.contains(Status::BER) {
            inner.ber = false;
        }
        if flags.contains(Status::NEGACK) {
            inner.negack = false;
        }
    }

    fn bus_busy(&self) -> bool {
        self.lock().bus_busy
    }

    fn clear_bus_busy(&self) {
        let mut inner = self.lock();
        inner.events.push(Event::ClearBusBusy);
        inner.bus_busy = false;
    }

    fn set_interrupts(&self, enable: bool) {
        let mut inner = self.lock();
        inner.events.push(Event::Interrupts(enable));
        inner.interrupts = enable;
    }

    fn set_enabled(&self, enable: bool) {
        let mut inner = self.lock();
        inner.events.push(Event::Enabled(enable));
        inner.enabled = enable;
        if !enable {
            inner.wedged = false;
            inner.hold_stop = false;
            inner.start_requested = false;
            inner.ber = false;
            inner.negack = false;
            inner.complete_stop();
        }
    }

    fn scl_level(&self) -> bool {
        !self.lock().scl_low
    }

    fn sda_level(&self) -> bool {
        let inner = self.lock();
        !(inner.sda_low || inner.sda_stuck_clocks > 0)
    }

    fn set_timing(&self, timing: Timing) {
        self.lock().events.push(Event::Timing(timing));
    }

    fn select_pin_set(&self, pin_set: PinSet) {
        self.lock().events.push(Event::PinSet(pin_set));
    }

    fn configure_io(&self, pin_set: PinSet, mode: IoMode) {
        self.lock().events.push(Event::Io(pin_set, mode));
    }

    fn set_raw_mode(&self, raw: bool) {
        let mut inner = self.lock();
        inner.events.push(Event::RawMode(raw));
        inner.raw = raw;
        if !raw {
            inner.scl_low = false;
            inner.sda_low = false;
        }
    }

    fn drive_scl(&self, high: bool) {
        let mut inner = self.lock();
        inner.events.push(Event::Scl(high));
        if !inner.raw {
            return;
        }
        if high && inner.scl_low && inner.sda_stuck_clocks > 0 {
            inner.sda_stuck_clocks -= 1;
        }
        inner.scl_low = !high;
    }

    fn drive_sda(&self, high: bool) {
        let mut inner = self.lock();
        inner.events.push(Event::Sda(high));
        if !inner.raw {
            return;
        }
        // a low-to-high SDA edge with SCL high is a STOP: the bus is free again
        if high && inner.sda_low && !inner.scl_low {
            inner.bus_busy = false;
        }
        inner.sda_low = !high;
    }
}
