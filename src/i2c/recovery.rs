//! Bus recovery: abort, module reset and unwedge

use embassy_time::{Duration, Instant, Timer};

use super::{ErrorCode, PortConfig, Registers, Status};

/// Polling budget for STOP completion and line release during recovery, in ms.
pub(crate) const RECOVERY_TIMEOUT_MS: u32 = 35;

/// Polling budget for STOP completion after a successful transfer, in ms.
pub(crate) const STOP_TIMEOUT_MS: u32 = 25;

/// Longest time a device may stretch SCL before unwedging gives up, in ms.
const SCL_STRETCH_TIMEOUT_MS: u64 = 25;

/// SCL pulses needed to clock out any byte a device may still be sending.
const UNWEDGE_CLOCKS: usize = 9;

/// Half period of the bit-banged recovery clock (100 kHz).
const HALF_PERIOD_US: u64 = 5;

/// Poll until a requested STOP has gone out on the bus; `false` after `timeout_ms` polls.
pub(crate) async fn wait_stop_completed<R: Registers>(regs: &R, timeout_ms: u32) -> bool {
    let mut remaining = timeout_ms;
    while remaining > 0 {
        if !regs.stop_pending() {
            return true;
        }
        remaining -= 1;
        if remaining > 0 {
            Timer::after_millis(1).await;
        }
    }
    false
}

/// Clear the fault flags, let the pending STOP finish and drop bus ownership.
async fn abort<R: Registers>(regs: &R, controller: usize) -> bool {
    regs.clear_status(Status::BER | Status::STASTR | Status::NEGACK);

    let stopped = wait_stop_completed(regs, RECOVERY_TIMEOUT_MS).await;
    if !stopped {
        warn!("Abort i2c {} fail!", controller);
    }

    regs.clear_bus_busy();
    stopped
}

/// Disable the module, wait for both lines to float high, then enable it again.
async fn reset<R: Registers>(regs: &R, controller: usize) {
    regs.set_enabled(false);

    let mut released = false;
    for _ in 0..RECOVERY_TIMEOUT_MS {
        if regs.scl_level() && regs.sda_level() {
            released = true;
            break;
        }
        Timer::after_millis(1).await;
    }
    if !released {
        warn!("Reset i2c {} fail!", controller);
    }

    regs.set_enabled(true);
}

/// Return the controller to a usable state after `error`.
///
/// A clean abort is enough after an address NACK; every other fault also resets the module.
pub(crate) async fn recover<R: Registers>(regs: &R, controller: usize, error: ErrorCode) {
    debug!("i2c {} recovery after {:?}", controller, error);

    if abort(regs, controller).await && error == ErrorCode::NoAddressMatch {
        return;
    }
    reset(regs, controller).await;
}

/// Free a bus held by a device that lost track of the transaction.
///
/// Takes over the pins as GPIOs, clocks SCL until the device lets go of SDA and finishes with a
/// manual START and STOP.
pub(crate) async fn unwedge<R: Registers>(regs: &R, port: &PortConfig) {
    regs.set_raw_mode(true);
    regs.drive_scl(true);
    regs.drive_sda(true);

    if !regs.scl_level() {
        // device may be stretching the clock
        let deadline = Instant::now() + Duration::from_millis(SCL_STRETCH_TIMEOUT_MS);
        while !regs.scl_level() && Instant::now() < deadline {
            Timer::after_micros(HALF_PERIOD_US).await;
        }
        if !regs.scl_level() {
            warn!("I2C unwedge failed, SCL is held low on port {}", port.port);
            regs.set_raw_mode(false);
            return;
        }
    }

    if regs.sda_level() {
        debug!("I2C port {} SDA already high", port.port);
    } else {
        info!("I2C unwedge called with SDA held low on port {}", port.port);

        for _ in 0..UNWEDGE_CLOCKS {
            if regs.sda_level() {
                break;
            }
            regs.drive_scl(false);
            Timer::after_micros(HALF_PERIOD_US).await;
            regs.drive_scl(true);
            Timer::after_micros(HALF_PERIOD_US).await;
        }

        if !regs.sda_level() {
            warn!("I2C unwedge failed, SDA still low on port {}", port.port);
        }
    }

    // START then STOP: SDA falls and rises again while SCL is high
    regs.drive_sda(false);
    Timer::after_micros(HALF_PERIOD_US).await;
    regs.drive_scl(true);
    Timer::after_micros(HALF_PERIOD_US).await;
    regs.drive_sda(true);
    Timer::after_micros(HALF_PERIOD_US).await;

    regs.set_raw_mode(false);
}
