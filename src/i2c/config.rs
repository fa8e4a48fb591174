use super::{AddressFormat, CONTROLLER_COUNT};
use crate::clocks::ClockSource;

/// Pin pair a controller is routed to
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinSet {
    /// default pins of the controller
    Primary,

    /// second pin pair of a multi-port controller
    Alternate,
}

/// Electrical configuration of a port's pins
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoMode {
    /// 3.3 V levels with the internal pull-ups enabled
    #[default]
    PullUp3V3,

    /// 1.8 V input thresholds, external pull-ups
    LowVoltage1V8,
}

/// One entry of the board's I2C port table
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortConfig {
    /// logical port number used by callers
    pub port: u8,
    /// physical controller index
    pub controller: usize,
    /// pins used by this port
    pub pin_set: PinSet,
    /// nominal bus speed in kHz
    pub kbps: u32,
    /// pin voltage / pull-up mode
    pub io: IoMode,
}

impl PortConfig {
    /// Port at 100 kHz with 3.3 V pull-ups.
    pub const fn new(port: u8, controller: usize, pin_set: PinSet) -> Self {
        Self {
            port,
            controller,
            pin_set,
            kbps: 100,
            io: IoMode::PullUp3V3,
        }
    }

    /// Override the bus speed.
    pub const fn kbps(self, kbps: u32) -> Self {
        Self { kbps, ..self }
    }

    /// Override the pin mode.
    pub const fn io(self, io: IoMode) -> Self {
        Self { io, ..self }
    }
}

/// Port layout of the reference board: controller 0 is muxed between two pin pairs
/// (ports 0 and 1), controllers 1..=3 have one pair each (ports 2..=4).
pub const DEFAULT_PORTS: [PortConfig; 5] = [
    PortConfig::new(0, 0, PinSet::Primary),
    PortConfig::new(1, 0, PinSet::Alternate),
    PortConfig::new(2, 1, PinSet::Primary),
    PortConfig::new(3, 2, PinSet::Primary),
    PortConfig::new(4, 3, PinSet::Primary),
];

/// SMBus master configuration
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct Config<'a> {
    /// ports wired on this board
    pub ports: &'a [PortConfig],

    /// clock feeding each controller
    pub clock_sources: [ClockSource; CONTROLLER_COUNT],

    /// how transfer addresses are encoded
    pub address_format: AddressFormat,
}

impl<'a> Config<'a> {
    /// Configuration for a board port table, other settings at their defaults.
    pub const fn new(ports: &'a [PortConfig]) -> Self {
        Self {
            ports,
            clock_sources: [ClockSource::Core, ClockSource::Core, ClockSource::Apb2, ClockSource::Apb2],
            address_format: AddressFormat::SevenBit,
        }
    }

    /// Look up a logical port.
    pub fn resolve(&self, port: u8) -> Option<&'a PortConfig> {
        self.ports.iter().find(|p| p.port == port)
    }

    /// Whether more than one port is routed through `controller`, so its pin mux matters.
    pub fn is_muxed(&self, controller: usize) -> bool {
        self.ports.iter().filter(|p| p.controller == controller).count() > 1
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.ports.iter().all(|p| p.controller < CONTROLLER_COUNT)
    }
}

impl Default for Config<'static> {
    fn default() -> Self {
        Self::new(&DEFAULT_PORTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_shared_controller_ports() {
        let config = Config::default();

        let p0 = config.resolve(0).unwrap();
        let p1 = config.resolve(1).unwrap();
        assert_eq!((p0.controller, p0.pin_set), (0, PinSet::Primary));
        assert_eq!((p1.controller, p1.pin_set), (0, PinSet::Alternate));
        assert_eq!(config.resolve(4).unwrap().controller, 3);

        assert!(config.is_muxed(0));
        assert!(!config.is_muxed(2));
    }

    #[test]
    fn unknown_port_does_not_resolve() {
        assert!(Config::default().resolve(9).is_none());
    }

    #[test]
    fn rejects_out_of_range_controller() {
        let ports = [PortConfig::new(0, CONTROLLER_COUNT, PinSet::Primary)];
        assert!(!Config::new(&ports).is_valid());
        assert!(Config::default().is_valid());
    }
}
