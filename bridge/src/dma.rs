//! DMA/buffer configurator.
//!
//! Programs the shared DMA engine for one transfer. The address source is
//! either the firmware-held buffer base (mirrored) or the address the
//! hardware reports for the channel (direct); both mirrored address pairs
//! always receive the same value.
//!
//! # Register sequence
//!
//! ```text
//! wait READY.IDLE (unbounded)
//! MODE, SRC pair, DST pair    [CONTROL low bits on the direct path]
//! TAG[0..4] = 0, TRAILER = 0
//! BUF_MODE 0x04 + LENGTH      (extended)
//! BUF_MODE 0x03 [+ re-arm]    (normal)
//! ```

use crate::bus::{RegisterBus, WaitTimeout};
use crate::context::Context;
use crate::regs::{buffer, dma};
use crate::tables;
use crate::types::TransferFlags;

/// Values written for the last configured transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParameters {
    /// Address copied into both mirrored pairs
    pub base: u16,
    /// Extended length byte, 0 in normal mode
    pub length: u8,
    /// DMA mode register value
    pub mode: u8,
    /// Buffer-control mode (0x03 or 0x04)
    pub buffer_mode: u8,
}

/// Configure the engine for `flags` on `channel`.
///
/// Blocks until the engine reports idle; there is no timeout.
pub fn configure<B: RegisterBus>(
    ctx: &mut Context<B>,
    flags: TransferFlags,
    channel: u8,
) -> TransferParameters {
    ctx.bus.wait_until_bit(dma::READY, dma::ready::IDLE, WaitTimeout::Forever);

    let (mode, base) = if flags.intersects(TransferFlags::MIRRORED) {
        (dma::mode::MIRRORED, ctx.state.buffer_base)
    } else {
        let mode = channel | dma::mode::DIRECT;
        ctx.bus
            .modify_byte(dma::CONTROL, !dma::CONTROL_KEEP, channel & !dma::CONTROL_KEEP);
        let lo = ctx.bus.read_byte(dma::HW_ADDR_LO);
        let hi = ctx.bus.read_byte(dma::HW_ADDR_HI);
        (mode, u16::from_le_bytes([lo, hi]))
    };

    let [lo, hi] = base.to_le_bytes();
    ctx.bus.write_byte(dma::SRC_LO, lo);
    ctx.bus.write_byte(dma::SRC_HI, hi);
    ctx.bus.write_byte(dma::DST_LO, lo);
    ctx.bus.write_byte(dma::DST_HI, hi);
    ctx.bus.write_byte(dma::MODE, mode);
    ctx.state.dma_mode = mode;

    for i in 0..dma::TAG_LEN {
        ctx.bus.write_byte(dma::TAG + i, 0);
    }
    ctx.bus.write_byte(dma::TRAILER, 0);

    let params = if flags.contains(TransferFlags::EXTENDED) {
        let length = ctx.state.extended_length;
        ctx.bus.write_byte(dma::BUF_MODE, dma::buf_mode::EXTENDED);
        ctx.bus.write_byte(dma::LENGTH, length);
        TransferParameters {
            base,
            length,
            mode,
            buffer_mode: dma::buf_mode::EXTENDED,
        }
    } else {
        ctx.bus.write_byte(dma::BUF_MODE, dma::buf_mode::NORMAL);
        let mut mode = mode;
        if !ctx.state.transfer_active && flags.contains(TransferFlags::MIRROR_SECONDARY) {
            mode = dma::mode::MIRRORED;
            ctx.bus.write_byte(dma::MODE, mode);
            ctx.bus.modify_byte(dma::STATUS, 0, dma::status::MARKER);
            ctx.state.dma_mode = mode;
        }
        TransferParameters {
            base,
            length: 0,
            mode,
            buffer_mode: dma::buf_mode::NORMAL,
        }
    };

    log::trace!(
        "dma: base={:#06x} mode={:#04x} buf_mode={:#04x} len={}",
        params.base,
        params.mode,
        params.buffer_mode,
        params.length
    );
    ctx.state.last_transfer = Some(params);
    params
}

/// Pick the buffer base high byte from a primary status value.
pub fn select_buffer<B: RegisterBus>(ctx: &mut Context<B>, primary: u8) -> u16 {
    let high = if primary != 0 {
        buffer::HIGH_ALT
    } else {
        buffer::HIGH_MAIN
    };
    ctx.state.buffer_base = (high as u16) << 8;
    ctx.state.buffer_base
}

/// Load the second buffer-address pair and offset for a secondary status.
pub fn resolve_secondary<B: RegisterBus>(ctx: &mut Context<B>, secondary: u8) -> u8 {
    let row = tables::buffer_row(secondary);
    let offset = row.offset.wrapping_add(secondary >> 4);
    ctx.bus.write_byte(dma::BUF2_LO, row.addr_lo);
    ctx.bus.write_byte(dma::BUF2_HI, row.addr_hi);
    ctx.bus.write_byte(dma::BUF_OFFSET, offset);
    ctx.state.buffer_offset = offset;
    offset
}
