//! Completion/event handler.
//!
//! Runs when the DMA engine signals completion. The handler re-derives the
//! transfer counter from hardware, waits for the matching completion
//! window, and either retires the slot or, if the window reports a state
//! the firmware did not expect, hands control to flash control.
//!
//! The flash-control transition does not return on hardware. Here it is a
//! [`CompletionOutcome::Reset`] that is also latched into the context;
//! once latched the controller does no further work.

use crate::bus::RegisterBus;
use crate::context::{BridgeStats, Context};
use crate::regs::{completion, dma, flash};
use crate::types::SlotIndex;

/// Bias added to the flash target when an event was pending.
pub const PENDING_BIAS: u8 = 0x08;

/// Terminal flash-control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequest {
    /// Value written to the flash target register
    pub state: u8,
}

/// Result of handling one completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CompletionOutcome {
    /// Slot retired normally
    Completed { slot: SlotIndex },
    /// State transition; the controller is now latched
    Reset(ResetRequest),
}

/// Handle one completion event.
pub fn handle<B: RegisterBus>(ctx: &mut Context<B>, event: u8) -> CompletionOutcome {
    ctx.state.pending = event;
    let counter = update_counter(ctx);

    ctx.bus.modify_byte(dma::STATUS, 0, dma::status::LATCH);
    ctx.bus.modify_byte(dma::STATUS, dma::status::LATCH, 0);

    let base = if ctx.state.pending != 0 {
        completion::BASE_PENDING
    } else {
        completion::BASE_IDLE
    };
    let window = base + counter as u16 * completion::STRIDE;

    let polls = ctx.config.completion_timeout(counter);
    if let Err(err) = ctx.wait_bounded(window, completion::READY, polls) {
        // proceed with whatever the window holds
        log::warn!("completion: {} after {} polls", err, polls);
    }

    let flag = ctx.bus.read_byte(window) & completion::STATE_MASK;
    if flag != ctx.state.status_helper {
        let mut target = (flag << 4) | counter;
        if ctx.state.pending != 0 {
            target = target.wrapping_add(PENDING_BIAS);
        }
        return flash_control(ctx, target);
    }

    ctx.bus.write_byte(dma::STATUS, 0);
    let slot = SlotIndex::masked(event);
    if ctx.state.queue.release(slot) {
        ctx.state.complete_log = ctx.state.complete_log.wrapping_add(1) & 0x1F;
        BridgeStats::bump(&mut ctx.stats.completions);
    } else {
        log::warn!("completion: slot {} was not in flight", slot.get());
    }

    if ctx.state.secondary_counter != ctx.state.queue.outstanding() & 0x07 {
        log::debug!(
            "completion: counter {} behind outstanding {}, rereading",
            ctx.state.secondary_counter,
            ctx.state.queue.outstanding()
        );
        update_counter(ctx);
    }

    CompletionOutcome::Completed { slot }
}

/// Re-derive the secondary counter and expected state flags from the
/// transfer status register.
fn update_counter<B: RegisterBus>(ctx: &mut Context<B>) -> u8 {
    let status = ctx.bus.read_byte(dma::XFER_STATUS);
    ctx.state.secondary_counter = (status >> 4) & 0x07;
    ctx.state.status_helper = status & completion::STATE_MASK;
    ctx.state.secondary_counter
}

fn flash_control<B: RegisterBus>(ctx: &mut Context<B>, target: u8) -> CompletionOutcome {
    let request = ResetRequest { state: target };
    log::error!("completion: state transition, flash control target {:#04x}", target);

    ctx.state.state_field = target;
    ctx.bus.write_byte(flash::TARGET, target);
    ctx.bus.write_byte(flash::CONTROL, flash::GO);
    ctx.state.latch_reset(request);
    BridgeStats::bump(&mut ctx.stats.resets);

    CompletionOutcome::Reset(request)
}
