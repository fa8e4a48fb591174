use super::{IoMode, PinSet, Timing};

/// Snapshot of the SMBST status register
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    /// SDA status: the data register needs service (write next byte or read received byte)
    pub const SDAST: Self = Self(1 << 6);
    /// bus error detected
    pub const BER: Self = Self(1 << 5);
    /// negative acknowledge received
    pub const NEGACK: Self = Self(1 << 4);
    /// stall after start
    pub const STASTR: Self = Self(1 << 3);

    /// No flag set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw register bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Build from raw register bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Whether every flag of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for Status {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Register-level access to one SMBus controller.
///
/// Implemented by the chip layer on top of its register block. Every method maps to a single
/// register access (or a read-modify-write of one bit field) and must be callable from both task
/// and interrupt context, so implementations take `&self` and rely on the hardware for interior
/// mutability.
pub trait Registers: Sync {
    /// Request a (repeated) START on the next bus cycle.
    fn generate_start(&self);

    /// Request a STOP after the current byte.
    fn generate_stop(&self);

    /// Whether a requested STOP has not yet been put on the bus.
    fn stop_pending(&self) -> bool;

    /// Answer the next received byte with NACK.
    fn arm_nack(&self);

    /// Write the data register (address byte or payload).
    fn write_data(&self, byte: u8);

    /// Read the data register, releasing SCL for the next byte.
    fn read_data(&self) -> u8;

    /// Read the status register.
    fn status(&self) -> Status;

    /// Write-one-to-clear the given status flags.
    fn clear_status(&self, flags: Status);

    /// Bus busy flag.
    fn bus_busy(&self) -> bool;

    /// Write-one-to-clear the bus busy flag.
    fn clear_bus_busy(&self);

    /// Enable or disable the controller interrupt and new-match interrupt sources.
    fn set_interrupts(&self, enable: bool);

    /// Enable or disable the whole module.
    fn set_enabled(&self, enable: bool);

    /// Sampled SCL line level.
    fn scl_level(&self) -> bool;

    /// Sampled SDA line level.
    fn sda_level(&self) -> bool;

    /// Program SCL timing.
    fn set_timing(&self, timing: Timing);

    /// Route the controller to one of its pin pairs.
    fn select_pin_set(&self, pin_set: PinSet);

    /// Configure pull-ups or low-voltage levels for a pin pair.
    fn configure_io(&self, pin_set: PinSet, mode: IoMode);

    /// Switch the active pins between SMBus alternate function and software controlled GPIO.
    fn set_raw_mode(&self, raw: bool);

    /// Drive SCL while in raw mode (`true` releases the line).
    fn drive_scl(&self, high: bool);

    /// Drive SDA while in raw mode (`true` releases the line).
    fn drive_sda(&self, high: bool);
}
