//! Core protocol types.

use core::fmt;

use bitflags::bitflags;

use crate::error::{BridgeError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// STATUS / ACTION CODES
// ═══════════════════════════════════════════════════════════════════════════

/// Recognized transport status codes.
pub mod status {
    pub const EXTENDED_IN: u8 = 0x28;
    pub const SIMPLE_IN: u8 = 0x2A;
    pub const EXTENDED_OUT: u8 = 0x88;
    pub const SIMPLE_OUT: u8 = 0x8A;
}

/// Byte read from the transport status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u8);

impl StatusCode {
    /// Map to an action code; `None` for anything unrecognized.
    pub const fn action(self) -> Option<ActionCode> {
        match self.0 {
            status::EXTENDED_IN => Some(ActionCode::ExtendedIn),
            status::SIMPLE_IN => Some(ActionCode::SimpleIn),
            status::EXTENDED_OUT => Some(ActionCode::ExtendedOut),
            status::SIMPLE_OUT => Some(ActionCode::SimpleOut),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Queue action selected by a status code.
///
/// Bit 1 selects the extended queue path, bit 0 the inbound direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionCode {
    SimpleOut = 0,
    SimpleIn = 1,
    ExtendedOut = 2,
    ExtendedIn = 3,
}

impl ActionCode {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Bit 1: extended queue path.
    pub const fn is_extended(self) -> bool {
        self.bits() & 0x02 != 0
    }

    /// Bit 0: device-to-host transfer.
    pub const fn is_inbound(self) -> bool {
        self.bits() & 0x01 != 0
    }
}

impl TryFrom<u8> for ActionCode {
    type Error = BridgeError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::SimpleOut),
            1 => Ok(Self::SimpleIn),
            2 => Ok(Self::ExtendedOut),
            3 => Ok(Self::ExtendedIn),
            other => Err(BridgeError::InvalidAction(other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// QUEUE SLOT INDEX
// ═══════════════════════════════════════════════════════════════════════════

/// Number of backend queue slots.
pub const QUEUE_SLOTS: usize = 32;

/// 5-bit slot mask.
pub const SLOT_MASK: u8 = 0x1F;

/// Index into the 32-slot ring. Always in `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const ZERO: Self = Self(0);

    /// Checked constructor.
    pub fn new(raw: u8) -> Result<Self> {
        if raw <= SLOT_MASK {
            Ok(Self(raw))
        } else {
            Err(BridgeError::InvalidSlot(raw))
        }
    }

    /// Keep the low 5 bits.
    pub const fn masked(raw: u8) -> Self {
        Self(raw & SLOT_MASK)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Next slot, wrapping 31 -> 0.
    pub const fn next(self) -> Self {
        Self::masked(self.0.wrapping_add(1))
    }

    /// Ring distance `self - earlier`, modulo 32.
    pub const fn distance_from(self, earlier: Self) -> u8 {
        self.0.wrapping_sub(earlier.0) & SLOT_MASK
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

/// Number of host-transport endpoints per lookup.
pub const ENDPOINT_COUNT: u8 = 8;

/// Table value meaning "no endpoint ready".
pub const NO_ENDPOINT: u8 = 8;

/// Validated endpoint index in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointIndex(u8);

impl EndpointIndex {
    /// `None` for the sentinel and anything above it.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw < ENDPOINT_COUNT {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for EndpointIndex {
    type Error = BridgeError;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw).ok_or(BridgeError::InvalidEndpoint(raw))
    }
}

/// Combined offset identifying the active endpoint handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOffset(pub u8);

// ═══════════════════════════════════════════════════════════════════════════
// PACKED CONTROL BYTES
// ═══════════════════════════════════════════════════════════════════════════

bitflags! {
    /// Flag byte handed to the DMA/buffer configurator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TransferFlags: u8 {
        /// Mirrored address source, primary.
        const MIRROR_PRIMARY = 1 << 1;
        /// Mirrored address source, secondary. Also re-arms the mirrored
        /// mode for normal-mode transfers.
        const MIRROR_SECONDARY = 1 << 2;
        /// Extended buffer-control mode.
        const EXTENDED = 1 << 4;

        const MIRRORED = Self::MIRROR_PRIMARY.bits() | Self::MIRROR_SECONDARY.bits();
    }
}

bitflags! {
    /// Control/status byte of a queue slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlotControl: u8 {
        /// Buffer window class (4 bits).
        const WINDOW = 0x0F;
        /// Backend reported completion.
        const DONE = 1 << 4;
        const INBOUND = 1 << 5;
        const EXTENDED = 1 << 6;
        /// Slot holds an outstanding command.
        const VALID = 1 << 7;
    }
}

impl SlotControl {
    /// Build the control byte for a freshly accepted action.
    pub fn for_action(action: ActionCode, window: u8) -> Self {
        let mut control = Self::VALID | Self::from_bits_retain(window & Self::WINDOW.bits());
        if action.is_inbound() {
            control |= Self::INBOUND;
        }
        if action.is_extended() {
            control |= Self::EXTENDED;
        }
        control
    }

    pub fn window(self) -> u8 {
        self.bits() & Self::WINDOW.bits()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFERRED REQUESTS
// ═══════════════════════════════════════════════════════════════════════════

/// Retry record left behind by a reject path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRequest {
    /// Target queue
    pub target: u8,
    /// Request flag
    pub flag: u8,
    /// Priority (higher wins)
    pub priority: u8,
}

impl DeferredRequest {
    pub const fn new(target: u8, flag: u8, priority: u8) -> Self {
        Self { target, flag, priority }
    }

    /// Global fault flag set.
    pub const FAULT: Self = Self::new(0, 0x3A, 2);

    /// Backend link down.
    pub const LINK_DOWN: Self = Self::new(0, 0x3B, 1);

    /// Link recovery attempt failed.
    pub const RECOVERY_FAILED: Self = Self::new(0, 0x3D, 1);

    /// Backend queue full, retry against `target` first.
    pub const fn queue_full(target: u8) -> Self {
        Self::new(target, 0x3C, 3)
    }
}
