//! Byte-level state machine, run from the controller interrupt

use super::state::Record;
use super::{ErrorCode, OperState, Registers, SmbMaster, Status};

/// Dummy byte written after STOP to release SDAST.
const FLUSH_BYTE: u8 = 0xff;

impl<R: Registers> SmbMaster<'_, R> {
    /// Service the interrupt of `controller`.
    ///
    /// Call this from the SMBn interrupt vector. It never blocks: it advances the transfer by one
    /// hardware event and wakes the waiting task once the transfer has finished or failed.
    pub fn on_interrupt(&self, controller: usize) {
        let (Some(ctrl), Some(regs)) = (self.state.controllers.get(controller), self.regs.get(controller)) else {
            return;
        };

        if ctrl.with(|rec| advance(regs, rec)) {
            ctrl.done.signal(());
        }
    }
}

/// Advance `rec` by one hardware event. Returns `true` when the waiting task must be woken.
pub(crate) fn advance<R: Registers>(regs: &R, rec: &mut Record) -> bool {
    let status = regs.status();
    let mut complete = false;

    // Condition 1: a bus error has been identified
    if status.contains(Status::BER) {
        regs.generate_stop();
        regs.clear_status(Status::BER);
        rec.error = ErrorCode::BusError;
        rec.state = OperState::Idle;
        trace!("-SP-BER");
        complete = true;
    }

    // Condition 2: a negative acknowledge has occurred
    if status.contains(Status::NEGACK) {
        regs.generate_stop();
        regs.clear_status(Status::NEGACK);
        rec.error = ErrorCode::NoAddressMatch;
        rec.state = OperState::Idle;
        trace!("-SP-NA");
        complete = true;
    }

    // Condition 3: SDA status is set - transmit or receive
    if status.contains(Status::SDAST) {
        complete |= handle_sda(regs, rec);
    }

    complete
}

fn handle_sda<R: Registers>(regs: &R, rec: &mut Record) -> bool {
    match rec.state {
        OperState::Start | OperState::RepeatStart => {
            address_phase(regs, rec);
            false
        }
        OperState::Write => write_phase(regs, rec),
        OperState::Read => read_phase(regs, rec),
        // stalled or finished: SDAST stays pending until the next call resumes the bus
        OperState::Idle | OperState::WriteSuspended | OperState::ReadSuspended => false,
    }
}

fn address_phase<R: Registers>(regs: &R, rec: &mut Record) {
    if rec.tx.len() == 0 {
        rec.state = OperState::Read;
        // receiving one byte only: NACK must be set before the address byte goes out
        if rec.rx.len() == 1 {
            regs.arm_nack();
        }
        regs.write_data(rec.address.read());
        trace!("-ARR-{:#x}", rec.address.write());
    } else {
        rec.state = OperState::Write;
        regs.write_data(rec.address.write());
        trace!("-ARW-{:#x}", rec.address.write());
    }
}

fn write_phase<R: Registers>(regs: &R, rec: &mut Record) -> bool {
    if let Some(byte) = rec.tx.get(rec.cursor) {
        regs.write_data(byte);
        rec.cursor += 1;
        trace!("-W({:#x})", byte);
        return false;
    }

    // all bytes written, nothing to receive
    if rec.rx.len() == 0 {
        if rec.flags.stop {
            regs.generate_stop();
            // clear SDAST
            regs.write_data(FLUSH_BYTE);
            trace!("-SP");
        }

        rec.error = ErrorCode::Ok;
        if rec.flags.stop {
            rec.state = OperState::Idle;
        } else {
            // keep SCL stretched until the next call resumes the transaction
            rec.state = OperState::WriteSuspended;
            regs.set_interrupts(false);
        }
        trace!("-END");
        return true;
    }

    // turn around: repeated START and address with R bit
    rec.state = OperState::Read;
    rec.cursor = 0;
    regs.generate_start();
    trace!("-RST");
    if rec.rx.len() == 1 && rec.flags.stop {
        regs.arm_nack();
        trace!("-GNA");
    }
    regs.write_data(rec.address.read());
    trace!("-ARR");
    false
}

fn read_phase<R: Registers>(regs: &R, rec: &mut Record) -> bool {
    let len = rec.rx.len();

    if rec.cursor + 1 == len {
        // last byte is about to be read
        if rec.flags.stop {
            // STOP must be set before reading the last byte
            regs.generate_stop();
            trace!("-SP");
        } else {
            // stall SCL after this byte until the next call
            regs.set_interrupts(false);
        }
    } else if rec.cursor + 2 == len && rec.flags.stop {
        // NACK before reading the byte-before-last, so it goes out after the last byte
        regs.arm_nack();
        trace!("-GNA");
    }

    let data = regs.read_data();
    trace!("-R({:#x})", data);

    if !rec.rx.set(rec.cursor, data) {
        regs.generate_stop();
        rec.error = ErrorCode::ReadOverflow;
        rec.state = OperState::Idle;
        warn!("SMB read overflow at byte {}", rec.cursor);
        return true;
    }
    rec.cursor += 1;

    if rec.cursor == len {
        rec.error = ErrorCode::Ok;
        rec.state = if rec.flags.stop {
            OperState::Idle
        } else {
            OperState::ReadSuspended
        };
        trace!("-END");
        return true;
    }

    false
}
