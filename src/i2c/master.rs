//! SMBus master transfers

use embassy_futures::select::{select, Either};
use embassy_hal_internal::drop::OnDrop;
use embassy_time::{Duration, Timer};

use super::recovery::{self, STOP_TIMEOUT_MS};
use super::state::ControllerState;
use super::{
    timing, Address, Config, ControllerStatus, Error, ErrorCode, Flags, OperState, PortConfig, Registers, Result,
    State, CONTROLLER_COUNT, DEFAULT_TIMEOUT_US,
};
use crate::clocks::ClockConfig;

/// Sampled SDA/SCL levels of a port
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineLevels {
    /// SDA is high
    pub sda_high: bool,
    /// SCL is high
    pub scl_high: bool,
}

impl LineLevels {
    /// Both lines released.
    pub const IDLE: Self = Self {
        sda_high: true,
        scl_high: true,
    };

    /// Whether both lines are high, as they must be before a START.
    pub const fn is_idle(&self) -> bool {
        self.sda_high && self.scl_high
    }
}

/// Interrupt-driven SMBus master over all controllers of the chip
pub struct SmbMaster<'d, R: Registers> {
    pub(super) regs: &'d [R; CONTROLLER_COUNT],
    pub(super) state: &'d State,
    config: Config<'d>,
}

impl<'d, R: Registers> SmbMaster<'d, R> {
    /// Bring up every controller used by `config`: pin IO modes, SCL timing, module enable.
    ///
    /// Records are reset to idle with the default timeout. The caller still has to route the
    /// controller interrupts to [`SmbMaster::on_interrupt`].
    pub fn new(regs: &'d [R; CONTROLLER_COUNT], state: &'d State, config: Config<'d>, clocks: &ClockConfig) -> Result<Self> {
        if !config.is_valid() {
            return Err(Error::InvalidPort);
        }

        let this = Self { regs, state, config };

        for port in config.ports {
            regs[port.controller].configure_io(port.pin_set, port.io);
        }

        this.on_clock_frequency_changed(clocks)?;

        for (controller, (regs, ctrl)) in regs.iter().zip(state.controllers.iter()).enumerate() {
            ctrl.with(|rec| {
                rec.clear_buffers();
                rec.state = OperState::Idle;
                rec.error = ErrorCode::Ok;
                rec.owned = false;
                rec.timeout_us = DEFAULT_TIMEOUT_US;
            });

            if config.ports.iter().any(|p| p.controller == controller) {
                regs.set_interrupts(false);
                regs.set_enabled(true);
            }
        }

        Ok(this)
    }

    /// Reprogram SCL timing of every configured port after a clock change.
    ///
    /// Must not be called while a transfer is in flight.
    pub fn on_clock_frequency_changed(&self, clocks: &ClockConfig) -> Result<()> {
        for port in self.config.ports {
            let source = self.config.clock_sources[port.controller];
            let timing = timing::compute(port.controller, port.kbps, clocks.frequency(source), clocks.is_low_osc())?;
            debug!("i2c port {} timing {:?}", port.port, timing);
            self.regs[port.controller].set_timing(timing);
        }
        Ok(())
    }

    /// Set the completion timeout of the controller behind `port`; zero restores the default.
    pub fn set_timeout(&self, port: u8, timeout_us: u32) -> Result<()> {
        let (_, ctrl, _) = self.lookup(port)?;
        let timeout_us = if timeout_us == 0 { DEFAULT_TIMEOUT_US } else { timeout_us };
        ctrl.with(|rec| rec.timeout_us = timeout_us);
        Ok(())
    }

    /// Bus busy flag of `controller`.
    pub fn bus_busy(&self, controller: usize) -> bool {
        self.regs.get(controller).is_some_and(|regs| regs.bus_busy())
    }

    /// Line levels of `port`. Ports that are not wired read as idle.
    pub fn line_levels(&self, port: u8) -> LineLevels {
        match self.config.resolve(port) {
            Some(cfg) => line_levels(&self.regs[cfg.controller]),
            None => LineLevels::IDLE,
        }
    }

    /// Diagnostic snapshot of `controller`.
    pub fn status(&self, controller: usize) -> Option<ControllerStatus> {
        let ctrl = self.state.controllers.get(controller)?;
        Some(ctrl.with(|rec| ControllerStatus::from(&*rec)))
    }

    /// Route `port`'s controller to its pins. Unknown ports leave the mux unchanged.
    pub fn select_port(&self, port: u8) {
        if let Some(cfg) = self.config.resolve(port) {
            self.select(cfg);
        }
    }

    /// Handle to `port` implementing the `embedded-hal-async` I2C traits.
    pub fn port(&self, port: u8) -> Result<I2cPort<'_, 'd, R>> {
        self.lookup(port)?;
        Ok(I2cPort { master: self, port })
    }

    /// Run one master transfer on `port`.
    ///
    /// Writes `out`, then reads into `input` after a repeated START. Either buffer may be empty.
    /// `address` is interpreted according to [`Config::address_format`]. With `flags.stop` clear
    /// the bus stays suspended and the next call on the same controller continues the
    /// transaction; see [`Flags`].
    pub async fn transfer(&self, port: u8, address: u8, out: &[u8], input: &mut [u8], flags: Flags) -> Result<()> {
        let address = self.config.address_format.address(address);
        self.execute(port, address, out, input, flags).await
    }

    async fn execute(&self, port: u8, address: Address, out: &[u8], input: &mut [u8], flags: Flags) -> Result<()> {
        if out.is_empty() && input.is_empty() {
            return Ok(());
        }

        let (cfg, ctrl, regs) = self.lookup(port)?;

        if !ctrl.claim() {
            return Err(Error::Busy);
        }

        let _release = OnDrop::new(|| {
            regs.set_interrupts(false);
            ctrl.with(|rec| {
                rec.owned = false;
                rec.clear_buffers();
                if rec.state.is_in_flight() {
                    rec.state = OperState::Idle;
                }
            });
        });

        self.select(cfg);
        ctrl.with(|rec| {
            rec.load(address, out, input, flags);
            // a START abandons whatever transaction was left suspended
            if flags.start {
                rec.state = OperState::Idle;
            }
        });

        // make sure we're in a good state to start
        if flags.start && (regs.bus_busy() || !line_levels(regs).is_idle()) {
            recovery::unwedge(regs, cfg).await;
            let error = ctrl.with(|rec| rec.error);
            recovery::recover(regs, cfg.controller, error).await;
            self.select(cfg);
        }

        let error = master_transaction(regs, ctrl, cfg.controller).await;
        trace!("-Err:{:?}", error);
        error.into_result()
    }

    fn lookup(&self, port: u8) -> Result<(&'d PortConfig, &'d ControllerState, &'d R)> {
        let cfg = self.config.resolve(port).ok_or(Error::InvalidPort)?;
        let ctrl = self.state.controllers.get(cfg.controller).ok_or(Error::InvalidPort)?;
        let regs = self.regs.get(cfg.controller).ok_or(Error::InvalidPort)?;
        Ok((cfg, ctrl, regs))
    }

    fn select(&self, cfg: &PortConfig) {
        if self.config.is_muxed(cfg.controller) {
            self.regs[cfg.controller].select_pin_set(cfg.pin_set);
        }
    }
}

fn line_levels<R: Registers>(regs: &R) -> LineLevels {
    LineLevels {
        sda_high: regs.sda_level(),
        scl_high: regs.scl_level(),
    }
}

/// Arm the controller for the loaded record and wait for the interrupt side to finish it.
async fn master_transaction<R: Registers>(regs: &R, ctrl: &ControllerState, controller: usize) -> ErrorCode {
    let resumed = ctrl.with(|rec| {
        match rec.state {
            OperState::WriteSuspended if rec.tx.len() == 0 => {
                // read bytes from next transaction
                rec.state = OperState::RepeatStart;
            }
            OperState::WriteSuspended => {
                // continue to write the other bytes
                rec.state = OperState::Write;
                if let Some(byte) = rec.tx.get(0) {
                    regs.write_data(byte);
                    rec.cursor = 1;
                    trace!("-W({:#x})", byte);
                }
            }
            OperState::ReadSuspended => {
                // SCL was released after the last byte of the previous call, so there is no
                // chance to arm NACK for a single byte read
                if rec.rx.len() == 1 {
                    rec.error = ErrorCode::BusError;
                    return false;
                }
                rec.state = OperState::Read;
            }
            _ => rec.state = OperState::Start,
        }
        true
    });

    if !resumed {
        warn!("I2C {} rxbuf size should exceed one byte in 2nd transaction", controller);
        recovery::recover(regs, controller, ErrorCode::BusError).await;
        ctrl.with(|rec| rec.state = OperState::Idle);
        return ErrorCode::BusError;
    }

    let (state, timeout_us) = ctrl.with(|rec| (rec.state, rec.timeout_us));

    ctrl.done.reset();
    if matches!(state, OperState::Start | OperState::RepeatStart) {
        regs.generate_start();
        trace!("ST");
    }
    regs.set_interrupts(true);

    let timeout = Timer::after(Duration::from_micros(u64::from(timeout_us)));
    let error = match select(ctrl.done.wait(), timeout).await {
        Either::First(()) => ctrl.with(|rec| rec.error),
        Either::Second(()) => {
            regs.set_interrupts(false);
            ctrl.with(|rec| {
                rec.state = OperState::Idle;
                rec.error = ErrorCode::Timeout;
            });
            warn!("i2c {} transfer timed out", controller);
            recovery::recover(regs, controller, ErrorCode::Timeout).await;
            return ErrorCode::Timeout;
        }
    };

    if error.needs_recovery() {
        recovery::recover(regs, controller, error).await;
    }

    if error == ErrorCode::Ok && !recovery::wait_stop_completed(regs, STOP_TIMEOUT_MS).await {
        warn!("STOP fail! scl {} is held by slave device!", controller);
        ctrl.with(|rec| rec.error = ErrorCode::Timeout);
        return ErrorCode::Timeout;
    }

    error
}

/// One port of an [`SmbMaster`], usable wherever an `embedded-hal-async` I2C bus is expected
///
/// Addresses are always 7-bit.
pub struct I2cPort<'a, 'd, R: Registers> {
    master: &'a SmbMaster<'d, R>,
    port: u8,
}

impl<R: Registers> I2cPort<'_, '_, R> {
    /// Logical port number.
    pub fn port(&self) -> u8 {
        self.port
    }
}

impl<R: Registers> embedded_hal_async::i2c::I2c<embedded_hal_async::i2c::SevenBitAddress> for I2cPort<'_, '_, R> {
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<()> {
        let address = Address::from_seven_bit(address);
        self.master.execute(self.port, address, &[], read, Flags::START_STOP).await
    }

    async fn write(&mut self, address: u8, write: &[u8]) -> Result<()> {
        let address = Address::from_seven_bit(address);
        self.master.execute(self.port, address, write, &mut [], Flags::START_STOP).await
    }

    async fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        let address = Address::from_seven_bit(address);
        self.master.execute(self.port, address, write, read, Flags::START_STOP).await
    }

    async fn transaction(&mut self, address: u8, operations: &mut [embedded_hal_1::i2c::Operation<'_>]) -> Result<()> {
        use embedded_hal_1::i2c::Operation;

        fn is_empty(op: &Operation<'_>) -> bool {
            match op {
                Operation::Read(buf) => buf.is_empty(),
                Operation::Write(buf) => buf.is_empty(),
            }
        }

        // a suspended read can't be turned around into a write, nor continued by a single byte
        // since NACK can no longer be armed for it
        let mut reading = false;
        for op in operations.iter().filter(|op| !is_empty(op)) {
            match op {
                Operation::Read(buf) if reading && buf.len() == 1 => return Err(Error::UnsupportedOperation),
                Operation::Read(_) => reading = true,
                Operation::Write(_) if reading => return Err(Error::UnsupportedOperation),
                Operation::Write(_) => {}
            }
        }

        let Some(last) = operations.iter().rposition(|op| !is_empty(op)) else {
            return Ok(());
        };

        let address = Address::from_seven_bit(address);
        let mut started = false;
        for (i, op) in operations.iter_mut().enumerate().take(last + 1) {
            if is_empty(op) {
                continue;
            }

            let flags = Flags {
                start: !started,
                stop: i == last,
            };
            match op {
                Operation::Read(buf) => self.master.execute(self.port, address, &[], buf, flags).await?,
                Operation::Write(buf) => self.master.execute(self.port, address, buf, &mut [], flags).await?,
            }
            started = true;
        }

        Ok(())
    }
}
