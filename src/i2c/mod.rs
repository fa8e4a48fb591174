//! Implements the interrupt-driven SMBus/I2C master engine
//!
//! The engine is split the way the work is split at runtime:
//!
//! - [`SmbMaster::transfer`] runs in task context: it claims a controller, arms it and awaits the
//!   completion signal with a timeout.
//! - [`SmbMaster::on_interrupt`] runs in interrupt context and advances the byte-level protocol
//!   one hardware event at a time.
//! - recovery (abort, reset, unwedge) runs in task context after a fault or timeout.

mod config;
mod error;
mod instance;
mod interrupt;
mod master;
mod recovery;
#[cfg(test)]
pub(crate) mod sim;
mod state;
mod timing;

pub use config::*;
pub use error::*;
pub use instance::*;
pub use master::*;
pub use state::*;
pub use timing::*;

/// Number of physical SMBus controllers.
pub const CONTROLLER_COUNT: usize = 4;

/// Completion timeout applied when none (or zero) is configured, 100 ms.
pub const DEFAULT_TIMEOUT_US: u32 = 100_000;

/// I2C address in its 8-bit wire form (R/W bit clear)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// Construct from a 7-bit address
    #[must_use]
    pub const fn from_seven_bit(addr: u8) -> Self {
        Self((addr & 0x7f) << 1)
    }

    /// Construct from an address already shifted into wire position
    #[must_use]
    pub const fn from_eight_bit(addr: u8) -> Self {
        Self(addr & !1)
    }

    /// interpret address as a read command
    #[must_use]
    pub const fn read(&self) -> u8 {
        self.0 | 1
    }

    /// interpret address as a write command
    #[must_use]
    pub const fn write(&self) -> u8 {
        self.0
    }
}

impl From<Address> for u8 {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// How callers of [`SmbMaster::transfer`] encode device addresses
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressFormat {
    /// 7-bit address, shifted by the driver
    #[default]
    SevenBit,

    /// address already in 8-bit wire form
    EightBit,
}

impl AddressFormat {
    /// Convert a caller supplied address into wire form.
    #[must_use]
    pub const fn address(self, addr: u8) -> Address {
        match self {
            Self::SevenBit => Address::from_seven_bit(addr),
            Self::EightBit => Address::from_eight_bit(addr),
        }
    }
}

/// Framing requested for one call to [`SmbMaster::transfer`]
///
/// Leaving `stop` clear parks the controller with SCL stretched so that the next call can continue
/// the same bus transaction without another START.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    /// begin with a START condition
    pub start: bool,

    /// end with a STOP condition
    pub stop: bool,
}

impl Flags {
    /// START ... STOP, a complete transaction
    pub const START_STOP: Self = Self { start: true, stop: true };

    /// START without STOP, leaves the bus suspended
    pub const START: Self = Self {
        start: true,
        stop: false,
    };

    /// continue a suspended transaction and finish it with STOP
    pub const STOP: Self = Self {
        start: false,
        stop: true,
    };

    /// continue a suspended transaction and stay suspended
    pub const NONE: Self = Self {
        start: false,
        stop: false,
    };
}

impl Default for Flags {
    fn default() -> Self {
        Self::START_STOP
    }
}
