use super::master::I2cPort;
use super::Registers;

/// SMBus result code recorded per controller
///
/// Written by the interrupt state machine (or by the orchestrator on timeout) and read back once
/// the controller has left the in-flight states.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    /// No error
    Ok,
    /// Channel is already occupied by another transfer
    ChannelOccupied,
    /// Bus frequency can not be produced from the peripheral clock
    BusFrequencyInvalid,
    /// Bus error detected mid-transaction
    BusError,
    /// No device acknowledged the address
    NoAddressMatch,
    /// More data arrived than the receive buffer holds
    ReadOverflow,
    /// Completion did not arrive in time
    Timeout,
    /// Module is occupied by another device
    ModuleBusy,
    /// Bus is occupied by another device
    BusBusy,
}

impl ErrorCode {
    /// Turn a recorded code into the value returned to callers.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::ChannelOccupied => Err(Error::Busy),
            Self::BusFrequencyInvalid => Err(TransferError::BusFrequencyInvalid.into()),
            Self::BusError => Err(TransferError::BusError.into()),
            Self::NoAddressMatch => Err(TransferError::NoAddressMatch.into()),
            Self::ReadOverflow => Err(TransferError::ReadOverflow.into()),
            Self::Timeout => Err(TransferError::Timeout.into()),
            Self::ModuleBusy => Err(TransferError::ModuleBusy.into()),
            Self::BusBusy => Err(TransferError::BusBusy.into()),
        }
    }

    /// Faults after which the bus needs an abort/reset before it can be used again.
    pub(crate) fn needs_recovery(self) -> bool {
        matches!(self, Self::BusError | Self::NoAddressMatch | Self::ReadOverflow)
    }
}

/// specific information regarding transfer errors
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Requested bus speed is not reachable from the peripheral clock
    BusFrequencyInvalid,
    /// Electrical fault on the bus
    BusError,
    /// Address not ACK'd
    NoAddressMatch,
    /// Device sent more data than requested
    ReadOverflow,
    /// Timeout error
    Timeout,
    /// Module is occupied by another device
    ModuleBusy,
    /// Bus is occupied by another device
    BusBusy,
}

/// Error information type
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// controller is owned by another transfer
    Busy,

    /// port is not present in the port table
    InvalidPort,

    /// operation sequence can not be expressed on this controller
    UnsupportedOperation,

    /// transaction failure types
    Transfer(TransferError),
}

/// shorthand for -> Result<T>
pub type Result<T> = core::result::Result<T, Error>;

impl From<TransferError> for Error {
    fn from(value: TransferError) -> Self {
        Error::Transfer(value)
    }
}

impl embedded_hal_1::i2c::Error for Error {
    fn kind(&self) -> embedded_hal_1::i2c::ErrorKind {
        match *self {
            Self::Busy | Self::InvalidPort | Self::UnsupportedOperation => embedded_hal_1::i2c::ErrorKind::Other,
            Self::Transfer(e) => match e {
                TransferError::BusError => embedded_hal_1::i2c::ErrorKind::Bus,
                TransferError::NoAddressMatch => {
                    embedded_hal_1::i2c::ErrorKind::NoAcknowledge(embedded_hal_1::i2c::NoAcknowledgeSource::Address)
                }
                TransferError::ReadOverflow => embedded_hal_1::i2c::ErrorKind::Overrun,
                TransferError::BusFrequencyInvalid
                | TransferError::Timeout
                | TransferError::ModuleBusy
                | TransferError::BusBusy => embedded_hal_1::i2c::ErrorKind::Other,
            },
        }
    }
}

impl<R: Registers> embedded_hal_1::i2c::ErrorType for I2cPort<'_, '_, R> {
    type Error = Error;
}

#[cfg(test)]
mod tests {
    use embedded_hal_1::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};

    use super::*;

    #[test]
    fn only_ok_is_success() {
        assert_eq!(ErrorCode::Ok.into_result(), Ok(()));
        assert_eq!(ErrorCode::ChannelOccupied.into_result(), Err(Error::Busy));
        assert_eq!(
            ErrorCode::Timeout.into_result(),
            Err(Error::Transfer(TransferError::Timeout))
        );
    }

    #[test]
    fn address_nack_maps_to_embedded_hal_kind() {
        let err: Error = TransferError::NoAddressMatch.into();
        assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        assert_eq!(Error::from(TransferError::BusError).kind(), ErrorKind::Bus);
        assert_eq!(Error::Busy.kind(), ErrorKind::Other);
    }
}
