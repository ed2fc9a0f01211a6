//! Fixed lookup tables.
//!
//! Endpoint dispatch uses three tables: a 256-entry index table mapping a
//! status bitmap to the highest-priority ready endpoint (lowest set bit,
//! sentinel 8 when empty), a per-index offset table and a per-index
//! clear-mask table. The gate and the buffer configurator each own one
//! small strided table.

use crate::types::{EndpointIndex, NO_ENDPOINT};

// ═══════════════════════════════════════════════════════════════════════════
// ENDPOINT DISPATCH
// ═══════════════════════════════════════════════════════════════════════════

const fn build_index_table() -> [u8; 256] {
    let mut table = [NO_ENDPOINT; 256];
    let mut bitmap = 1;
    while bitmap < 256 {
        table[bitmap] = (bitmap as u8).trailing_zeros() as u8;
        bitmap += 1;
    }
    table
}

/// Status bitmap -> endpoint index (8 = none ready).
pub static ENDPOINT_INDEX: [u8; 256] = build_index_table();

/// First-level index -> handler block offset.
pub const ENDPOINT_OFFSET: [u8; 8] = [0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38];

/// Second-level index -> acknowledge mask.
pub const ENDPOINT_CLEAR_MASK: [u8; 8] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

/// Look up a bitmap, validating against the sentinel.
#[inline]
pub fn endpoint_index(bitmap: u8) -> Option<EndpointIndex> {
    EndpointIndex::new(ENDPOINT_INDEX[bitmap as usize])
}

#[inline]
pub fn endpoint_offset(index: EndpointIndex) -> u8 {
    ENDPOINT_OFFSET[index.as_usize()]
}

#[inline]
pub fn clear_mask(index: EndpointIndex) -> u8 {
    ENDPOINT_CLEAR_MASK[index.as_usize()]
}

// ═══════════════════════════════════════════════════════════════════════════
// GATE STATE TABLE
// ═══════════════════════════════════════════════════════════════════════════

/// Bytes per gate table row.
pub const GATE_ROW_STRIDE: usize = 10;

/// Rows, indexed by the low bits of the rolling status byte.
pub const GATE_ROWS: usize = 8;

/// Row layout: verdict, target, flag, priority, reserved.
pub const GATE_TABLE: [[u8; GATE_ROW_STRIDE]; GATE_ROWS] = [
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0],
    // backend throttling: retry later
    [0x05, 0x00, 0x3E, 0x01, 0, 0, 0, 0, 0, 0],
    // backend resync: reject with a dedicated code
    [0x0D, 0x01, 0x3F, 0x02, 0, 0, 0, 0, 0, 0],
];

/// Decoded gate table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRow {
    /// 0 = ready, otherwise the reject code
    pub verdict: u8,
    pub target: u8,
    pub flag: u8,
    pub priority: u8,
}

pub fn gate_row(rolling_status: u8) -> GateRow {
    let row = &GATE_TABLE[rolling_status as usize % GATE_ROWS];
    GateRow {
        verdict: row[0],
        target: row[1],
        flag: row[2],
        priority: row[3],
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUFFER TABLE
// ═══════════════════════════════════════════════════════════════════════════

/// Bytes per buffer table row.
pub const BUFFER_ROW_STRIDE: usize = 20;

pub const BUFFER_ROWS: usize = 4;

/// Row layout: address lo, address hi, base offset, reserved.
pub const BUFFER_TABLE: [[u8; BUFFER_ROW_STRIDE]; BUFFER_ROWS] = [
    [0x00, 0x84, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0x00, 0x86, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0x00, 0xA4, 0x20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0x00, 0xA6, 0x30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
];

/// Decoded buffer table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRow {
    pub addr_lo: u8,
    pub addr_hi: u8,
    pub offset: u8,
}

pub fn buffer_row(secondary_status: u8) -> BufferRow {
    let row = &BUFFER_TABLE[secondary_status as usize % BUFFER_ROWS];
    BufferRow {
        addr_lo: row[0],
        addr_hi: row[1],
        offset: row[2],
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SLOT WINDOW TABLE
// ═══════════════════════════════════════════════════════════════════════════

/// Window base for the simple queue path, indexed by direction bit.
pub const SLOT_WINDOW_TABLE: [u8; 2] = [0x04, 0x08];
