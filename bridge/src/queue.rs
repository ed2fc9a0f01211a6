//! Backend command queue.
//!
//! [`QueueRing`] mirrors the backend's 32-slot command ring; [`run`] is the
//! queue action state machine that every backend-touching path goes
//! through. Nothing here touches a slot unless the gate returned
//! [`GateOutcome::Proceed`].
//!
//! Only the 5-bit ring counters wrap. Any other counter that would
//! overflow or underflow is logged and left alone.

use crate::bus::RegisterBus;
use crate::config::InProgressCode;
use crate::context::Context;
use crate::dma;
use crate::gate::{self, GateOutcome};
use crate::regs::{backend, transport};
use crate::tables::SLOT_WINDOW_TABLE;
use crate::types::{ActionCode, SlotControl, SlotIndex, TransferFlags, QUEUE_SLOTS, SLOT_MASK};

// ═══════════════════════════════════════════════════════════════════════════
// RING
// ═══════════════════════════════════════════════════════════════════════════

/// One ring entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSlot {
    pub control: SlotControl,
    pub byte_count: u8,
}

impl QueueSlot {
    pub const EMPTY: Self = Self {
        control: SlotControl::empty(),
        byte_count: 0,
    };

    pub fn is_free(&self) -> bool {
        !self.control.contains(SlotControl::VALID)
    }
}

/// Firmware view of the backend command ring.
#[derive(Debug, Clone)]
pub struct QueueRing {
    slots: [QueueSlot; QUEUE_SLOTS],
    /// Next slot to fill
    index: SlotIndex,
    /// Segments left in the current burst (5-bit)
    counter: u8,
    /// A burst is in flight
    busy: bool,
    /// Last slot handed to the backend issue register
    issue_ptr: SlotIndex,
    /// Submitted, not yet completed
    outstanding: u8,
}

impl Default for QueueRing {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueRing {
    pub const fn new() -> Self {
        Self {
            slots: [QueueSlot::EMPTY; QUEUE_SLOTS],
            index: SlotIndex::ZERO,
            counter: 0,
            busy: false,
            issue_ptr: SlotIndex::ZERO,
            outstanding: 0,
        }
    }

    pub fn index(&self) -> SlotIndex {
        self.index
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn issue_ptr(&self) -> SlotIndex {
        self.issue_ptr
    }

    pub fn outstanding(&self) -> u8 {
        self.outstanding
    }

    /// No burst in flight and nothing outstanding.
    pub fn is_idle(&self) -> bool {
        !self.busy && self.outstanding == 0
    }

    pub fn slot(&self, index: SlotIndex) -> &QueueSlot {
        &self.slots[index.as_usize()]
    }

    /// Start a burst unless one is already running. Returns true if armed.
    fn arm(&mut self, param1: u8) -> bool {
        if self.busy {
            return false;
        }
        self.counter = param1 & SLOT_MASK;
        self.busy = true;
        true
    }

    /// Fill the slot at the index and post-increment.
    fn occupy(&mut self, slot: QueueSlot) -> SlotIndex {
        let at = self.index;
        self.slots[at.as_usize()] = slot;
        self.index = at.next();
        at
    }

    fn clear(&mut self, index: SlotIndex) {
        self.slots[index.as_usize()] = QueueSlot::EMPTY;
    }

    fn submitted(&mut self) {
        match self.outstanding.checked_add(1) {
            Some(n) if n as usize <= QUEUE_SLOTS => self.outstanding = n,
            _ => log::warn!("queue: outstanding overflow at {}", self.outstanding),
        }
    }

    /// Decrement the burst counter. `Some(ptr)` when the issue pointer
    /// advanced, `None` when the burst ended.
    fn step(&mut self) -> Option<SlotIndex> {
        self.counter = self.counter.wrapping_sub(1) & SLOT_MASK;
        if self.counter != 0 {
            self.issue_ptr = self.issue_ptr.next();
            Some(self.issue_ptr)
        } else {
            self.busy = false;
            None
        }
    }

    /// Free a slot named by a completion event.
    ///
    /// Returns false if the slot was already free. An outstanding count of
    /// zero is logged, not corrected.
    pub fn release(&mut self, index: SlotIndex) -> bool {
        let was_valid = !self.slot(index).is_free();
        self.clear(index);
        match self.outstanding.checked_sub(1) {
            Some(n) => self.outstanding = n,
            None => log::warn!("queue: outstanding underflow releasing slot {}", index.get()),
        }
        was_valid
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════

/// Queue action result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Gate verdict, propagated verbatim
    Gate(GateOutcome),
    /// 0x05: slot not free while a transfer is running
    Defer,
    /// 0x09: extended path queued
    Queued,
    /// Simple path accepted; code depends on configuration
    InProgress(InProgressCode),
    /// 0x0C: slot not free, nothing running
    Busy,
}

impl QueueOutcome {
    pub const DEFER: u8 = 0x05;
    pub const QUEUED: u8 = 0x09;
    pub const BUSY: u8 = 0x0C;

    pub const fn code(self) -> u8 {
        match self {
            Self::Gate(outcome) => outcome.code(),
            Self::Defer => Self::DEFER,
            Self::Queued => Self::QUEUED,
            Self::InProgress(code) => code.code(),
            Self::Busy => Self::BUSY,
        }
    }
}

/// Run one queue action.
///
/// `param1` carries the burst length in its low 5 bits and the buffer
/// window in its top 3; `param2` is the byte count.
pub fn run<B: RegisterBus>(
    ctx: &mut Context<B>,
    param1: u8,
    param2: u8,
    action: ActionCode,
) -> QueueOutcome {
    ctx.state.last_action = Some(action);

    // the gate clears transfer-active; escalation keys on the entry value
    let was_active = ctx.state.transfer_active;
    let verdict = gate::check(ctx);
    if !verdict.is_proceed() {
        if verdict.is_retry() && was_active {
            ctx.state.escalate_retry = true;
        }
        return QueueOutcome::Gate(verdict);
    }

    let index = ctx.state.queue.index();
    if !ctx.state.queue.slot(index).is_free() {
        if ctx.dma_active() {
            ctx.state.escalate_retry = true;
            log::debug!("queue: slot {} held, transfer running", index.get());
            return QueueOutcome::Defer;
        }
        log::debug!("queue: slot {} held", index.get());
        return QueueOutcome::Busy;
    }

    let slot_addr = slot_address(index);
    ctx.bus.modify_byte(backend::DEVICE_STATUS, backend::device::PENDING, 0);
    ctx.bus.write_byte(backend::COUNT_A, ctx.state.core_state[0]);
    ctx.bus.write_byte(backend::COUNT_B, ctx.state.core_state[1]);

    if ctx.state.queue.arm(param1) {
        ctx.bus.modify_byte(backend::QUEUE_CTRL, 0, backend::queue::BUSY);
    }

    let window = param1 >> 5;
    let control = SlotControl::for_action(action, window);
    ctx.state.queue.occupy(QueueSlot {
        control,
        byte_count: param2,
    });
    ctx.bus.write_byte(slot_addr + backend::slot::CONTROL, control.bits());
    ctx.bus.write_byte(slot_addr + backend::slot::COUNT, param2);

    let host_flags = TransferFlags::from_bits_truncate(ctx.bus.read_byte(transport::FLAGS));

    if action.is_extended() {
        ctx.state.secondary_update = true;
        ctx.bus.modify_byte(backend::QUEUE_CTRL, 0, backend::queue::SECONDARY_UPDATE);

        let head = SlotIndex::masked(ctx.bus.read_byte(backend::HEAD));
        ctx.state.index_distance = ctx.state.queue.index().distance_from(head);
        record_submission(ctx);

        dma::configure(ctx, host_flags | TransferFlags::EXTENDED, index.get());
        ctx.state.transfer_active = true;
        advance(ctx);
        return QueueOutcome::Queued;
    }

    let combined = SLOT_WINDOW_TABLE[action.is_inbound() as usize].wrapping_add(control.window());
    if (param2 >> 3) <= (combined & SLOT_MASK) {
        // fits in the window: no backend command needed
        ctx.state.queue.clear(index);
        ctx.bus.write_byte(slot_addr + backend::slot::CONTROL, 0);
    } else {
        record_submission(ctx);
    }
    ctx.bus.modify_byte(
        slot_addr + backend::slot::STATUS,
        backend::slot::STATUS_MASK,
        combined & backend::slot::STATUS_MASK,
    );

    let secondary = ctx.bus.read_byte(backend::STATUS);
    dma::select_buffer(ctx, action.is_inbound() as u8);
    dma::resolve_secondary(ctx, secondary);
    dma::configure(ctx, host_flags - TransferFlags::EXTENDED, index.get());
    ctx.state.transfer_active = true;
    advance(ctx);

    QueueOutcome::InProgress(ctx.config.in_progress)
}

/// Address of a slot's register block.
pub fn slot_address(index: SlotIndex) -> u16 {
    backend::SLOT_BASE + index.get() as u16 * backend::SLOT_STRIDE
}

fn record_submission<B: RegisterBus>(ctx: &mut Context<B>) {
    ctx.state.queue.submitted();
    ctx.state.submit_log = ctx.state.submit_log.wrapping_add(1) & SLOT_MASK;
}

/// Step the burst counter and publish the result to the backend.
fn advance<B: RegisterBus>(ctx: &mut Context<B>) {
    match ctx.state.queue.step() {
        Some(ptr) => ctx.bus.write_byte(backend::ISSUE, ptr.get()),
        None => ctx.bus.modify_byte(backend::QUEUE_CTRL, backend::queue::BUSY, 0),
    }
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
    fn test_ring_wraps() {
        let mut ring = QueueRing::new();
        for _ in 0..QUEUE_SLOTS {
            let at = ring.occupy(QueueSlot::EMPTY);
            ring.clear(at);
        }
        assert_eq!(ring.index(), SlotIndex::ZERO);
    }

    #[test]
    fn test_release_underflow_is_logged_not_fixed() {
        let mut ring = QueueRing::new();
        assert!(!ring.release(SlotIndex::masked(3)));
        assert_eq!(ring.outstanding(), 0);

        ring.occupy(QueueSlot {
            control: SlotControl::VALID,
            byte_count: 8,
        });
        ring.submitted();
        assert!(ring.release(SlotIndex::ZERO));
        assert!(ring.is_idle());
    }

    #[test]
    fn test_counter_wraps_masked() {
        let mut ring = QueueRing::new();
        assert!(ring.arm(0x20));
        assert_eq!(ring.counter(), 0);
        assert_eq!(ring.step(), Some(SlotIndex::masked(1)));
        assert_eq!(ring.counter(), 0x1F);
        assert!(!ring.arm(0x05));
    }

    #[test]
    fn test_gate_outcome_propagates() {
        let mut ctx = ctx();
        ctx.state.fault = true;
        let outcome = run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert_eq!(outcome, QueueOutcome::Gate(GateOutcome::NotReady));
        assert_eq!(outcome.code(), 0x02);
        assert_eq!(ctx.state.last_action, Some(ActionCode::SimpleOut));
        assert!(ctx.state.queue.slot(SlotIndex::ZERO).is_free());
        assert_eq!(ctx.bus.first_write(regs::backend::COUNT_A), None);
    }

    #[test]
    fn test_retry_escalates_when_active() {
        let mut ctx = ctx();
        ctx.state.fault = true;
        ctx.state.transfer_active = true;
        run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert!(ctx.state.escalate_retry);
    }

    #[test]
    fn test_queue_full_escalates_when_active() {
        let mut ctx = ctx();
        ctx.state.transfer_active = true;
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::FULL);

        let outcome = run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert_eq!(outcome, QueueOutcome::Gate(GateOutcome::Retry));
        assert_eq!(outcome.code(), 0x05);
        assert!(ctx.state.escalate_retry);
    }

    #[test]
    fn test_link_down_escalates_when_active() {
        let mut ctx = ctx();
        ctx.state.transfer_active = true;
        ctx.bus.poke(regs::backend::LINK_STATUS, 0);

        let outcome = run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert_eq!(outcome, QueueOutcome::Gate(GateOutcome::NotReady));
        assert!(ctx.state.escalate_retry);
    }

    #[test]
    fn test_retry_without_transfer_does_not_escalate() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::QUEUE_DEPTH, regs::backend::depth::FULL);

        let outcome = run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert_eq!(outcome, QueueOutcome::Gate(GateOutcome::Retry));
        assert!(!ctx.state.escalate_retry);
    }

    #[test]
    fn test_held_slot() {
        let mut ctx = ctx();
        ctx.state.queue.occupy(QueueSlot {
            control: SlotControl::VALID,
            byte_count: 1,
        });
        // ring index moved on; put it back on the held slot
        for _ in 1..QUEUE_SLOTS {
            let at = ctx.state.queue.occupy(QueueSlot::EMPTY);
            ctx.state.queue.clear(at);
        }

        assert_eq!(run(&mut ctx, 1, 0x40, ActionCode::SimpleOut), QueueOutcome::Busy);
        assert!(!ctx.state.escalate_retry);

        ctx.bus.poke(regs::dma::STATUS, regs::dma::status::ACTIVE);
        let outcome = run(&mut ctx, 1, 0x40, ActionCode::SimpleOut);
        assert_eq!(outcome, QueueOutcome::Defer);
        assert_eq!(outcome.code(), 0x05);
        assert!(ctx.state.escalate_retry);
    }

    #[test]
    fn test_simple_path() {
        let mut ctx = ctx();
        ctx.state.core_state = [0x12, 0x34];
        let outcome = run(&mut ctx, 0x03, 0xF0, ActionCode::SimpleOut);

        assert_eq!(outcome, QueueOutcome::InProgress(InProgressCode::Reference));
        assert_eq!(outcome.code(), 0x0A);
        assert_eq!(ctx.bus.peek(regs::backend::COUNT_A), 0x12);
        assert_eq!(ctx.bus.peek(regs::backend::COUNT_B), 0x34);
        assert_eq!(ctx.state.queue.index(), SlotIndex::masked(1));
        assert_eq!(ctx.state.queue.outstanding(), 1);
        assert_eq!(ctx.state.submit_log, 1);
        // burst of 3: one step taken, issue pointer advanced
        assert_eq!(ctx.state.queue.counter(), 2);
        assert_eq!(ctx.bus.peek(regs::backend::ISSUE), 1);
        assert!(ctx.state.transfer_active);

        let slot = ctx.state.queue.slot(SlotIndex::ZERO);
        assert!(slot.control.contains(SlotControl::VALID));
        assert_eq!(slot.byte_count, 0xF0);
        assert_eq!(
            ctx.bus.peek(slot_address(SlotIndex::ZERO) + regs::backend::slot::STATUS) & 0x0F,
            0x04
        );
    }

    #[test]
    fn test_simple_path_short_transfer_clears_slot() {
        let mut ctx = ctx();
        let outcome = run(&mut ctx, 0x01, 0x10, ActionCode::SimpleIn);
        assert_eq!(outcome.code(), 0x0A);
        assert!(ctx.state.queue.slot(SlotIndex::ZERO).is_free());
        assert_eq!(ctx.state.queue.outstanding(), 0);
        // single-segment burst ends immediately
        assert!(!ctx.state.queue.is_busy());
        assert_eq!(
            ctx.bus.peek(regs::backend::QUEUE_CTRL) & regs::backend::queue::BUSY,
            0
        );
    }

    #[test]
    fn test_patched_code() {
        let mut ctx = Context::new(SimBus::powered(), BridgeConfig::patched());
        let outcome = run(&mut ctx, 0x01, 0xF0, ActionCode::SimpleOut);
        assert_eq!(outcome.code(), 0x05);
        // same number as Defer, different meaning
        assert_ne!(outcome, QueueOutcome::Defer);
    }

    #[test]
    fn test_extended_path() {
        let mut ctx = ctx();
        ctx.bus.poke(regs::backend::HEAD, 0x1E);
        let outcome = run(&mut ctx, 0x02, 0x80, ActionCode::ExtendedIn);

        assert_eq!(outcome, QueueOutcome::Queued);
        assert_eq!(outcome.code(), 0x09);
        assert!(ctx.state.secondary_update);
        assert_ne!(
            ctx.bus.peek(regs::backend::QUEUE_CTRL) & regs::backend::queue::SECONDARY_UPDATE,
            0
        );
        // index 1 vs head 30
        assert_eq!(ctx.state.index_distance, 3);
        assert_eq!(ctx.bus.peek(regs::dma::BUF_MODE), regs::dma::buf_mode::EXTENDED);
    }

    #[test]
    fn test_slot_index_wraps_through_queue() {
        let mut ctx = ctx();
        for _ in 0..QUEUE_SLOTS {
            // short transfers free their slot immediately
            run(&mut ctx, 0x01, 0x00, ActionCode::SimpleOut);
        }
        assert_eq!(ctx.state.queue.index(), SlotIndex::ZERO);
    }
}
