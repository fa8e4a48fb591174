//! Peripheral clock frequencies consumed by the SMBus controllers

/// Oscillator frequency at or below which fast-mode timing uses calibrated constants.
pub const LOW_OSC_THRESHOLD_HZ: u32 = 15_000_000;

/// Clock feeding an SMBus controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// core (CPU) clock
    Core,

    /// APB2 peripheral bus clock
    Apb2,
}

/// Clock configuration as seen by the SMBus block.
///
/// The engine never programs the clock tree; it only reads these values to derive SCL timing.
/// Hand a new value to [`SmbMaster::on_clock_frequency_changed`](crate::i2c::SmbMaster::on_clock_frequency_changed)
/// whenever the core or APB2 frequency changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct ClockConfig {
    /// Oscillator frequency in Hz.
    pub osc_hz: u32,
    /// Core clock frequency in Hz.
    pub core_hz: u32,
    /// APB2 clock frequency in Hz.
    pub apb2_hz: u32,
}

impl ClockConfig {
    /// Clock configuration derived from the oscillator, with core and APB2 running at its rate.
    pub const fn crystal(osc_hz: u32) -> Self {
        Self {
            osc_hz,
            core_hz: osc_hz,
            apb2_hz: osc_hz,
        }
    }

    /// Override the core and APB2 frequencies.
    pub const fn with_dividers(self, core_hz: u32, apb2_hz: u32) -> Self {
        Self {
            osc_hz: self.osc_hz,
            core_hz,
            apb2_hz,
        }
    }

    /// Frequency of `source` in Hz.
    pub const fn frequency(&self, source: ClockSource) -> u32 {
        match source {
            ClockSource::Core => self.core_hz,
            ClockSource::Apb2 => self.apb2_hz,
        }
    }

    /// Whether fast-mode timing must come from the calibrated table.
    pub const fn is_low_osc(&self) -> bool {
        self.osc_hz <= LOW_OSC_THRESHOLD_HZ
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::crystal(LOW_OSC_THRESHOLD_HZ)
    }
}
