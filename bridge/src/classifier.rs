//! Transport status classifier.
//!
//! Reads the host transport status byte and turns one of the four known
//! codes into a queue action. Anything else is idle traffic: nothing is
//! touched and the next pass reads the register again.

use crate::bus::RegisterBus;
use crate::context::{BridgeStats, Context};
use crate::queue::{self, QueueOutcome};
use crate::regs::transport;
use crate::types::StatusCode;

/// Classify the current transport status and run the matching action.
///
/// Returns `None` when the status byte is not a recognized code.
pub fn classify<B: RegisterBus>(ctx: &mut Context<B>) -> Option<QueueOutcome> {
    let status = StatusCode(ctx.bus.read_byte(transport::STATUS));
    let Some(action) = status.action() else {
        log::trace!("classifier: status {} idle", status);
        BridgeStats::bump(&mut ctx.stats.idle);
        return None;
    };

    ctx.state.scratch = 0;
    ctx.state.core_state = [
        ctx.bus.read_byte(transport::CORE_LO),
        ctx.bus.read_byte(transport::CORE_HI),
    ];
    let param1 = ctx.bus.read_byte(transport::PARAM1);
    let param2 = ctx.bus.read_byte(transport::PARAM2);
    BridgeStats::bump(&mut ctx.stats.actions);

    log::debug!(
        "classifier: status {} -> {:?} p1={:#04x} p2={:#04x}",
        status,
        action,
        param1,
        param2
    );
    Some(queue::run(ctx, param1, param2, action))
}
