//! Bridge error types
//!
//! Protocol outcomes (gate and queue result codes) are not errors; they
//! travel as [`GateOutcome`](crate::GateOutcome) and
//! [`QueueOutcome`](crate::QueueOutcome). This type covers misuse of the
//! API and hardware that never answers a bounded wait.

use core::fmt;

pub type Result<T> = core::result::Result<T, BridgeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// Raw value is not one of the four action codes.
    InvalidAction(u8),
    /// Raw value does not fit the 5-bit slot index.
    InvalidSlot(u8),
    /// Raw value is the "no endpoint" sentinel or beyond it.
    InvalidEndpoint(u8),
    /// The controller already took the flash-control transition.
    ResetLatched,
    /// A bounded register wait expired.
    WaitTimeout { addr: u16, mask: u8 },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAction(raw) => write!(f, "invalid action code {:#04x}", raw),
            Self::InvalidSlot(raw) => write!(f, "slot index {} out of range", raw),
            Self::InvalidEndpoint(raw) => write!(f, "endpoint index {} out of range", raw),
            Self::ResetLatched => write!(f, "controller is latched into reset"),
            Self::WaitTimeout { addr, mask } => {
                write!(f, "timed out waiting for {:#06x} & {:#04x}", addr, mask)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            BridgeError::InvalidAction(0x07).to_string(),
            "invalid action code 0x07"
        );
        assert_eq!(
            BridgeError::WaitTimeout { addr: 0xB100, mask: 0x80 }.to_string(),
            "timed out waiting for 0xb100 & 0x80"
        );
    }
}
