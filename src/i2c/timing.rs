//! SCL timing derived from bus speed and peripheral clock
//!
//! tSCL = 4 * SCLFRQ * tCLK, so SCLFRQ = fCLK / (4 * fSCL). Fast mode splits the period into
//! explicit low/high halves (tSCLL = 2 * SCLLT * tCLK); with equal halves each half uses the same
//! divider. Below a 15 MHz oscillator the formula rounds too coarsely for 400 kHz, so measured
//! values are used for the clock rates the EC actually runs at.

use super::{Result, TransferError};

/// Largest SCLFRQ value (7 bits in CTL2 plus 2 bits in CTL3).
pub const SCLFRQ_MAX: u32 = 0x1ff;

/// Highest bus speed served in standard mode.
pub const STANDARD_MODE_MAX_KHZ: u32 = 100;

/// SCL timing register values
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timing {
    /// standard mode divider
    Standard {
        /// SCL frequency divider
        sclfrq: u16,
    },

    /// fast mode, explicit half periods
    Fast {
        /// SCL low time
        scllt: u8,
        /// SCL high time
        sclht: u8,
        /// data hold time, left at reset value when `None`
        hldt: Option<u8>,
    },
}

impl Timing {
    /// SCLFRQ bits 6..0, programmed into CTL2
    pub const fn sclfrq_low(&self) -> u8 {
        match self {
            Self::Standard { sclfrq } => (*sclfrq & 0x7f) as u8,
            Self::Fast { .. } => 0,
        }
    }

    /// SCLFRQ bits 8..7, programmed into CTL3
    pub const fn sclfrq_high(&self) -> u8 {
        match self {
            Self::Standard { sclfrq } => ((*sclfrq >> 7) & 0x3) as u8,
            Self::Fast { .. } => 0,
        }
    }

    /// Whether the 400K bit must be set.
    pub const fn is_fast(&self) -> bool {
        matches!(self, Self::Fast { .. })
    }
}

/// Calibrated 400 kHz values for low clock rates: (clock Hz, SCLLT, SCLHT, HLDT)
const FAST_400K_TABLE: [(u32, u8, u8, u8); 4] = [
    (15_000_000, 12, 9, 7),
    (15_000_000 / 2, 7, 5, 7),
    (13_000_000, 11, 8, 7),
    (13_000_000 / 2, 7, 4, 7),
];

/// Compute the timing for `bus_khz` on a controller clocked at `clock_hz`.
///
/// `low_osc` selects the calibrated fast-mode table; see [`ClockConfig::is_low_osc`](crate::ClockConfig::is_low_osc).
pub fn compute(controller: usize, bus_khz: u32, clock_hz: u32, low_osc: bool) -> Result<Timing> {
    if bus_khz == 0 {
        return Err(TransferError::BusFrequencyInvalid.into());
    }

    let divider = (clock_hz / 1000) / bus_khz.saturating_mul(4);
    if divider == 0 {
        return Err(TransferError::BusFrequencyInvalid.into());
    }

    if bus_khz <= STANDARD_MODE_MAX_KHZ {
        if divider > SCLFRQ_MAX {
            return Err(TransferError::BusFrequencyInvalid.into());
        }
        return Ok(Timing::Standard { sclfrq: divider as u16 });
    }

    let half = u8::try_from(divider).map_err(|_| TransferError::BusFrequencyInvalid)?;
    let formula = Timing::Fast {
        scllt: half,
        sclht: half,
        hldt: None,
    };

    if !low_osc {
        return Ok(formula);
    }

    if bus_khz != 400 {
        warn!("I2C {} doesn't support over 400kHz if src clock is low", controller);
        return Ok(formula);
    }

    match FAST_400K_TABLE.iter().find(|(hz, ..)| *hz == clock_hz) {
        Some(&(_, scllt, sclht, hldt)) => Ok(Timing::Fast {
            scllt,
            sclht,
            hldt: Some(hldt),
        }),
        None => {
            warn!("Not optimized timing for i2c {}", controller);
            Ok(formula)
        }
    }
}
