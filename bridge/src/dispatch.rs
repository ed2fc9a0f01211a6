//! Endpoint dispatch loop.
//!
//! Two-level lookup over the endpoint status registers: the first bitmap
//! picks a group, the group's secondary register picks the endpoint. Each
//! hit runs the handler, then acknowledges by writing the endpoint's bit
//! back (write-1-to-clear). The loop is bounded so a stuck bit cannot
//! starve the main loop.

use crate::bus::RegisterBus;
use crate::context::{BridgeStats, Context};
use crate::regs::endpoint;
use crate::tables;
use crate::types::DispatchOffset;

/// Maximum handler invocations per call.
pub const DISPATCH_BUDGET: u8 = 32;

/// Per-endpoint callback.
///
/// The handler receives the combined dispatch offset and the bus; it runs
/// with the controller lock held.
pub trait EndpointHandler<B: RegisterBus> {
    fn handle(&mut self, offset: DispatchOffset, bus: &mut B);
}

impl<B, F> EndpointHandler<B> for F
where
    B: RegisterBus,
    F: FnMut(DispatchOffset, &mut B),
{
    fn handle(&mut self, offset: DispatchOffset, bus: &mut B) {
        self(offset, bus)
    }
}

/// Result of one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    /// Handler invocations
    pub handled: u8,
    /// Budget ran out with endpoints possibly still pending
    pub exhausted: bool,
}

/// Service ready endpoints, at most [`DISPATCH_BUDGET`] times.
pub fn run<B, H>(ctx: &mut Context<B>, handler: &mut H) -> DispatchSummary
where
    B: RegisterBus,
    H: EndpointHandler<B> + ?Sized,
{
    let mut summary = DispatchSummary::default();

    while summary.handled < DISPATCH_BUDGET {
        let Some(first) = tables::endpoint_index(ctx.bus.read_byte(endpoint::STATUS)) else {
            return summary;
        };
        let group = endpoint::BASE + first.get() as u16;
        let Some(second) = tables::endpoint_index(ctx.bus.read_byte(group)) else {
            return summary;
        };

        let offset = DispatchOffset(tables::endpoint_offset(first) + second.get());
        ctx.state.dispatch_offset = Some(offset);
        handler.handle(offset, &mut ctx.bus);
        BridgeStats::bump(&mut ctx.stats.endpoint_events);
        summary.handled += 1;

        ctx.bus.write_byte(group, tables::clear_mask(second));
    }

    log::warn!("dispatch: budget of {} exhausted", DISPATCH_BUDGET);
    BridgeStats::bump(&mut ctx.stats.dispatch_exhausted);
    summary.exhausted = true;
    summary
}
