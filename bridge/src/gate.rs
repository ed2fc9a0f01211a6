//! Transfer readiness gate.
//!
//! Decides whether a queue action may touch the backend. Checks run in a
//! fixed priority order; the first one that rejects wins. Every reject
//! that is not a plain busy signal leaves a [`DeferredRequest`] behind so
//! the caller can retry with known parameters. [`GateOutcome::Complete`]
//! is not a reject: the backend drained with completions still to log,
//! so there is nothing to retry and no record is left.
//!
//! ```text
//! fault? ──yes──▶ NotReady (+defer 0/0x3A/2)
//!   │
//! clear transfer-active, DMA mode
//!   │
//! command active? ──yes──▶ drop secondary transport flag
//!   │ no
//! link up? ──no──▶ NotReady (+defer)
//!   │
//! queue full? ──yes──▶ Retry (+defer, high priority)
//!   │
//! busy? ──yes──▶ InProgress
//!   │
//! drained? ──▶ log counters / link recovery
//!   │
//! state table[rolling status] ──▶ Proceed | Reject (+defer)
//! ```

use crate::bus::{RegisterBus, WaitTimeout};
use crate::context::{BridgeStats, Context};
use crate::regs::{backend, transport};
use crate::tables;
use crate::types::DeferredRequest;

/// Gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// 0: go ahead
    Proceed,
    /// 1: transfer already complete; leaves no deferred request
    Complete,
    /// 2: not ready
    NotReady,
    /// 5: retry later
    Retry,
    /// 0x0B: in progress, poll again without resubmitting
    InProgress,
    /// Caller-specific reject code from the state table
    Reject(u8),
}

impl GateOutcome {
    pub const PROCEED: u8 = 0x00;
    pub const COMPLETE: u8 = 0x01;
    pub const NOT_READY: u8 = 0x02;
    pub const RETRY: u8 = 0x05;
    pub const IN_PROGRESS: u8 = 0x0B;

    pub const fn code(self) -> u8 {
        match self {
            Self::Proceed => Self::PROCEED,
            Self::Complete => Self::COMPLETE,
            Self::NotReady => Self::NOT_READY,
            Self::Retry => Self::RETRY,
            Self::InProgress => Self::IN_PROGRESS,
            Self::Reject(code) => code,
        }
    }

    pub const fn from_code(code: u8) -> Self {
        match code {
            Self::PROCEED => Self::Proceed,
            Self::COMPLETE => Self::Complete,
            Self::NOT_READY => Self::NotReady,
            Self::RETRY => Self::Retry,
            Self::IN_PROGRESS => Self::InProgress,
            other => Self::Reject(other),
        }
    }

    pub const fn is_proceed(self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// Not-ready/retry class (2 and 5).
    pub const fn is_retry(self) -> bool {
        matches!(self, Self::NotReady | Self::Retry)
    }
}

/// Run the gate.
pub fn check<B: RegisterBus>(ctx: &mut Context<B>) -> GateOutcome {
    let outcome = evaluate(ctx);
    if !outcome.is_proceed() {
        BridgeStats::bump(&mut ctx.stats.gate_rejects);
        log::debug!("gate: {:?} (code {:#04x})", outcome, outcome.code());
    }
    outcome
}

fn evaluate<B: RegisterBus>(ctx: &mut Context<B>) -> GateOutcome {
    if ctx.state.fault {
        ctx.defer(DeferredRequest::FAULT);
        return GateOutcome::NotReady;
    }

    ctx.state.transfer_active = false;
    ctx.state.dma_mode = 0;

    let link_up = link_up(&mut ctx.bus);
    if ctx.state.command_active {
        ctx.bus.modify_byte(transport::FLAGS, transport::flags::SECONDARY, 0);
    } else if !link_up {
        ctx.defer(DeferredRequest::LINK_DOWN);
        return GateOutcome::NotReady;
    }

    let depth = if link_up {
        let depth = ctx.bus.read_byte(backend::QUEUE_DEPTH);
        if depth & backend::depth::FULL != 0 {
            let target = ctx.state.queue.index().get();
            ctx.defer(DeferredRequest::queue_full(target));
            return GateOutcome::Retry;
        }
        Some(depth)
    } else {
        None
    };

    if !ctx.state.transfer_state && backend_busy(&mut ctx.bus) {
        return GateOutcome::InProgress;
    }

    if depth == Some(backend::depth::DRAINED) {
        if ctx.state.submit_log != ctx.state.complete_log {
            // drained, but completions are still waiting to be logged
            return GateOutcome::Complete;
        }
        if !ctx.state.power_init && !recover_link(&mut ctx.bus) {
            log::warn!("gate: link recovery failed");
            ctx.defer(DeferredRequest::RECOVERY_FAILED);
            return GateOutcome::NotReady;
        }
    }

    let rolling = ctx.bus.read_byte(backend::ROLLING_STATUS);
    let row = tables::gate_row(rolling);
    if row.verdict == 0 {
        return GateOutcome::Proceed;
    }
    ctx.defer(DeferredRequest::new(row.target, row.flag, row.priority));
    GateOutcome::from_code(row.verdict)
}

fn link_up<B: RegisterBus>(bus: &mut B) -> bool {
    bus.read_byte(backend::LINK_STATUS) & backend::link::UP != 0
}

fn backend_busy<B: RegisterBus>(bus: &mut B) -> bool {
    bus.read_byte(backend::STATUS) & backend::status::BUSY != 0
}

/// Retrain the link and rerun setup. The training wait is unbounded.
fn recover_link<B: RegisterBus>(bus: &mut B) -> bool {
    bus.write_byte(backend::LINK_CTRL, backend::link::RECOVER);
    bus.wait_until_bit(backend::LINK_STATUS, backend::link::TRAINED, WaitTimeout::Forever);
    bus.write_byte(backend::LINK_CTRL, backend::link::SETUP);
    link_up(bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::regs;
    use crate::sim::SimBus;

    fn ctx() -> Context<SimBus> {
        Context::new(SimBus::powered(), BridgeConfig::reference())
    }

    #[test]
    fn test_proceed() {
        let mut ctx = ctx();
        assert_eq!(check(&mut ctx), GateOutcome::Proceed);
        assert_eq!(ctx.state.deferred(), None);
        assert_eq!(ctx.stats.gate_rejects, 0);
    }

    #[test]
    fn test_fault_overrides_everything() {
        let mut ctx = ctx();
        ctx.state.fault = true;
        ctx.state.transfer_active = true;
        ctx.bus.poke(regs::backend::LINK_STATUS, 0);
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::FULL);

        assert_eq!(check(&mut ctx), GateOutcome::NotReady);
        assert_eq!(ctx.state.deferred(), Some(DeferredRequest::new(0, 0x3A, 2)));
        // fault path returns before the flags are cleared
        assert!(ctx.state.transfer_active);
    }

    #[test]
    fn test_clears_transfer_flags() {
        let mut ctx = ctx();
        ctx.state.transfer_active = true;
        ctx.state.dma_mode = 0x55;
        check(&mut ctx);
        assert!(!ctx.state.transfer_active);
        assert_eq!(ctx.state.dma_mode, 0);
    }

    #[test]
    fn test_link_down() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::LINK_STATUS, 0);
        assert_eq!(check(&mut ctx), GateOutcome::NotReady);
        assert_eq!(ctx.state.deferred(), Some(DeferredRequest::LINK_DOWN));
    }

    #[test]
    fn test_command_active_skips_link() {
        let mut ctx = ctx();
        ctx.state.command_active = true;
        ctx.bus.poke(regs::backend::LINK_STATUS, 0);
        ctx.bus.poke(regs::transport::FLAGS, 0xFF);

        assert_eq!(check(&mut ctx), GateOutcome::Proceed);
        assert_eq!(
            ctx.bus.peek(regs::transport::FLAGS),
            0xFF & !regs::transport::flags::SECONDARY
        );
    }

    #[test]
    fn test_queue_full() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, 0x80 | 0x10);
        assert_eq!(check(&mut ctx), GateOutcome::Retry);
        assert_eq!(ctx.state.deferred(), Some(DeferredRequest::queue_full(0)));
        assert!(ctx.state.deferred().unwrap().priority > DeferredRequest::FAULT.priority);
    }

    #[test]
    fn test_busy_is_in_progress() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::STATUS, regs::backend::status::BUSY);
        assert_eq!(check(&mut ctx), GateOutcome::InProgress);
        assert_eq!(ctx.state.deferred(), None);

        ctx.state.transfer_state = true;
        assert_eq!(check(&mut ctx), GateOutcome::Proceed);
    }

    #[test]
    fn test_drained_with_unlogged_completions() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::DRAINED);
        ctx.state.submit_log = 3;
        ctx.state.complete_log = 2;
        assert_eq!(check(&mut ctx), GateOutcome::Complete);
        assert_eq!(ctx.state.deferred(), None);
        assert_eq!(ctx.stats.deferred, 0);
    }

    #[test]
    fn test_drained_recovery_succeeds() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::DRAINED);
        assert_eq!(check(&mut ctx), GateOutcome::Proceed);
        let ctrl: Vec<u8> = ctx.bus.writes_to(regs::backend::LINK_CTRL).collect();
        assert_eq!(ctrl, vec![regs::backend::link::RECOVER, regs::backend::link::SETUP]);
    }

    #[test]
    fn test_drained_recovery_fails() {
        let mut sim = SimBus::powered();
        sim.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::DRAINED);
        let mut ctx = Context::new(FlakyLink(sim), BridgeConfig::reference());

        assert_eq!(check(&mut ctx), GateOutcome::NotReady);
        assert_eq!(ctx.state.deferred(), Some(DeferredRequest::RECOVERY_FAILED));
    }

    #[test]
    fn test_power_init_skips_recovery() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::DRAINED);
        ctx.state.power_init = true;
        assert_eq!(check(&mut ctx), GateOutcome::Proceed);
        assert_eq!(ctx.bus.first_write(regs::backend::LINK_CTRL), None);
    }

    #[test]
    fn test_state_table_reject() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::ROLLING_STATUS, 6);
        assert_eq!(check(&mut ctx), GateOutcome::Retry);
        assert_eq!(ctx.state.take_deferred(), Some(DeferredRequest::new(0, 0x3E, 1)));

        ctx.bus.poke(regs::backend::ROLLING_STATUS, 0x0F);
        assert_eq!(check(&mut ctx), GateOutcome::Reject(0x0D));
        assert_eq!(ctx.state.take_deferred(), Some(DeferredRequest::new(1, 0x3F, 2)));
        assert_eq!(ctx.stats.gate_rejects, 2);
    }

    #[test]
    fn test_codes() {
        for code in [0x00, 0x01, 0x02, 0x05, 0x0B, 0x0D, 0x42] {
            assert_eq!(GateOutcome::from_code(code).code(), code);
        }
        assert!(GateOutcome::NotReady.is_retry());
        assert!(GateOutcome::Retry.is_retry());
        assert!(!GateOutcome::InProgress.is_retry());
    }

    /// Link drops as soon as setup is written.
    struct FlakyLink(SimBus);

    impl RegisterBus for FlakyLink {
        fn read_byte(&mut self, addr: u16) -> u8 {
            self.0.read_byte(addr)
        }

        fn write_byte(&mut self, addr: u16, value: u8) {
            self.0.write_byte(addr, value);
            if addr == regs::backend::LINK_CTRL && value == regs::backend::link::SETUP {
                self.0.poke(regs::backend::LINK_STATUS, regs::backend::link::TRAINED);
            }
        }

        fn wait_until_bit(&mut self, addr: u16, mask: u8, timeout: WaitTimeout) -> bool {
            self.0.wait_until_bit(addr, mask, timeout)
        }
    }
}
