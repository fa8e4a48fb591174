//! Per-controller transfer records
//!
//! A record is shared by exactly two actors: the task that owns the current transfer and the
//! controller interrupt. The task writes the record before arming the hardware and reads it back
//! after the completion signal (or after it has disabled the interrupt on timeout or drop); in
//! between, only the interrupt touches the cursor, state and buffers. Every access goes through
//! the critical-section mutex so the two sides never observe a half-updated record.

use core::cell::RefCell;
use core::ptr::NonNull;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_sync::signal::Signal;

use super::{Address, ErrorCode, Flags, CONTROLLER_COUNT, DEFAULT_TIMEOUT_US};

/// SMBus driver state, reflecting events seen on the bus
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperState {
    /// no transaction
    Idle,
    /// START requested for a new transaction
    Start,
    /// sending payload bytes
    Write,
    /// receiving payload bytes
    Read,
    /// repeated START requested to turn a suspended write into a read
    RepeatStart,
    /// write finished without STOP, SCL stretched
    WriteSuspended,
    /// read finished without STOP, SCL stretched
    ReadSuspended,
}

impl OperState {
    /// Whether the interrupt side currently drives the record.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Start | Self::Write | Self::Read | Self::RepeatStart)
    }
}

/// Borrowed transmit buffer, valid for the duration of one transfer
pub(crate) struct TxBuf {
    ptr: NonNull<u8>,
    len: usize,
}

impl TxBuf {
    const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    fn new(buf: &[u8]) -> Self {
        Self {
            ptr: NonNull::from(buf).cast(),
            len: buf.len(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            // SAFETY: the pointer came from a slice of `len` bytes that the owning task keeps
            // borrowed until the record is cleared, and `index` is in bounds.
            Some(unsafe { *self.ptr.as_ptr().add(index) })
        } else {
            None
        }
    }
}

/// Borrowed receive buffer, valid for the duration of one transfer
pub(crate) struct RxBuf {
    ptr: NonNull<u8>,
    len: usize,
}

impl RxBuf {
    const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    fn new(buf: &mut [u8]) -> Self {
        Self {
            len: buf.len(),
            ptr: NonNull::from(buf).cast(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Store `byte` at `index`; `false` when the buffer is already full.
    pub(crate) fn set(&mut self, index: usize, byte: u8) -> bool {
        if index < self.len {
            // SAFETY: the pointer came from an exclusive borrow of `len` bytes that the owning
            // task does not touch until the record is cleared, and `index` is in bounds.
            unsafe { *self.ptr.as_ptr().add(index) = byte };
            true
        } else {
            false
        }
    }
}

/// Controller record
pub(crate) struct Record {
    pub(crate) flags: Flags,
    pub(crate) tx: TxBuf,
    pub(crate) rx: RxBuf,
    pub(crate) cursor: usize,
    pub(crate) address: Address,
    pub(crate) state: OperState,
    pub(crate) error: ErrorCode,
    pub(crate) owned: bool,
    pub(crate) timeout_us: u32,
}

// SAFETY: the raw buffer pointers are only dereferenced while the owning transfer keeps the
// borrowed slices alive, and every access is serialized by the critical-section mutex.
unsafe impl Send for Record {}

impl Record {
    pub(crate) const fn new() -> Self {
        Self {
            flags: Flags::START_STOP,
            tx: TxBuf::empty(),
            rx: RxBuf::empty(),
            cursor: 0,
            address: Address::from_eight_bit(0),
            state: OperState::Idle,
            error: ErrorCode::Ok,
            owned: false,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }

    /// Load the parameters of a new call.
    pub(crate) fn load(&mut self, address: Address, out: &[u8], input: &mut [u8], flags: Flags) {
        self.flags = flags;
        self.tx = TxBuf::new(out);
        self.rx = RxBuf::new(input);
        self.address = address;
        self.cursor = 0;
        self.error = ErrorCode::Ok;
    }

    /// Drop the borrowed buffers once the transfer is over.
    pub(crate) fn clear_buffers(&mut self) {
        self.tx = TxBuf::empty();
        self.rx = RxBuf::empty();
    }
}

/// State of one controller: its record and the completion signal of the running transfer
pub struct ControllerState {
    pub(crate) record: CriticalSectionMutex<RefCell<Record>>,
    pub(crate) done: Signal<CriticalSectionRawMutex, ()>,
}

impl ControllerState {
    const fn new() -> Self {
        Self {
            record: CriticalSectionMutex::new(RefCell::new(Record::new())),
            done: Signal::new(),
        }
    }

    /// Run `f` on the record with interrupts masked.
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut Record) -> T) -> T {
        critical_section::with(|cs| f(&mut self.record.borrow(cs).borrow_mut()))
    }

    /// Take ownership of the controller; `false` if another transfer holds it.
    pub(crate) fn claim(&self) -> bool {
        self.with(|rec| {
            if rec.owned {
                false
            } else {
                rec.owned = true;
                true
            }
        })
    }
}

/// Records of all controllers
///
/// Meant to live in a `static` so the interrupt vectors can reach it:
///
/// ```rust,ignore
/// static STATE: State = State::new();
/// ```
pub struct State {
    pub(crate) controllers: [ControllerState; CONTROLLER_COUNT],
}

impl State {
    /// Records in their power-on state: idle, unowned, default timeout.
    pub const fn new() -> Self {
        const INIT: ControllerState = ControllerState::new();
        Self {
            controllers: [INIT; CONTROLLER_COUNT],
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic snapshot of a controller record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStatus {
    /// protocol state
    pub state: OperState,
    /// last recorded error
    pub error: ErrorCode,
    /// position in the active buffer
    pub cursor: usize,
    /// whether a transfer currently owns the controller
    pub owned: bool,
    /// completion timeout in microseconds
    pub timeout_us: u32,
}

impl From<&Record> for ControllerStatus {
    fn from(rec: &Record) -> Self {
        Self {
            state: rec.state,
            error: rec.error,
            cursor: rec.cursor,
            owned: rec.owned,
            timeout_us: rec.timeout_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let state = State::new();
        let ctrl = &state.controllers[1];

        assert!(ctrl.claim());
        assert!(!ctrl.claim());
        ctrl.with(|rec| rec.owned = false);
        assert!(ctrl.claim());
    }

    #[test]
    fn buffers_are_bounds_checked() {
        let out = [1u8, 2];
        let mut input = [0u8; 1];
        let mut rec = Record::new();
        rec.load(Address::from_seven_bit(0x50), &out, &mut input, Flags::START_STOP);

        assert_eq!(rec.tx.get(1), Some(2));
        assert_eq!(rec.tx.get(2), None);
        assert!(rec.rx.set(0, 0xaa));
        assert!(!rec.rx.set(1, 0xbb));

        rec.clear_buffers();
        assert_eq!(rec.tx.len(), 0);
        assert_eq!(rec.rx.len(), 0);
        assert_eq!(input, [0xaa]);
    }
}
