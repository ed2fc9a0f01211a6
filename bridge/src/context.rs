//! Shared bridge context.
//!
//! Everything the controller firmware kept in scattered globals lives
//! here and is passed by reference to each component. The
//! [`Controller`](crate::Controller) owns one `Context` behind its lock.

use crate::bus::{RegisterBus, WaitTimeout};
use crate::completion::ResetRequest;
use crate::config::BridgeConfig;
use crate::dma::TransferParameters;
use crate::error::{BridgeError, Result};
use crate::queue::QueueRing;
use crate::regs;
use crate::types::{ActionCode, DeferredRequest, DispatchOffset};

// ═══════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Firmware-side protocol state.
#[derive(Debug, Clone)]
pub struct BridgeState {
    // --- gate inputs ---
    /// Global fault flag
    pub fault: bool,
    /// A transfer is being set up
    pub transfer_active: bool,
    /// DMA mode parameter, reset by the gate
    pub dma_mode: u8,
    /// Command state active; link is not required while set
    pub command_active: bool,
    /// Transfer state flag; skips the busy check while set
    pub transfer_state: bool,
    /// Power-up init still running; suppresses link recovery
    pub power_init: bool,
    /// Submission log counter (5-bit)
    pub submit_log: u8,
    /// Completion log counter (5-bit)
    pub complete_log: u8,

    // --- queue ---
    /// Action recorded by the last state machine run
    pub last_action: Option<ActionCode>,
    /// Sticky request for the caller to escalate its retry
    pub escalate_retry: bool,
    /// Core state pair programmed into the backend count registers
    pub core_state: [u8; 2],
    /// Backend command ring
    pub queue: QueueRing,
    /// Secondary queue-state update requested
    pub secondary_update: bool,
    /// Distance between queue index and backend head (5-bit)
    pub index_distance: u8,

    // --- classifier ---
    /// Per-transfer scratch byte
    pub scratch: u8,

    // --- dma ---
    /// 2-byte buffer base used for mirrored transfers
    pub buffer_base: u16,
    /// Offset derived from the secondary buffer table
    pub buffer_offset: u8,
    /// Extended-length source
    pub extended_length: u8,
    /// Last programmed transfer
    pub last_transfer: Option<TransferParameters>,

    // --- dispatch ---
    /// Active dispatch offset
    pub dispatch_offset: Option<DispatchOffset>,

    // --- completion ---
    /// Pending event
    pub pending: u8,
    /// Secondary counter derived from transfer status
    pub secondary_counter: u8,
    /// Expected state flags
    pub status_helper: u8,
    /// State field written before flash control
    pub state_field: u8,

    deferred: Option<DeferredRequest>,
    reset: Option<ResetRequest>,
}

impl BridgeState {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            fault: false,
            transfer_active: false,
            dma_mode: 0,
            command_active: false,
            transfer_state: false,
            power_init: false,
            submit_log: 0,
            complete_log: 0,
            last_action: None,
            escalate_retry: false,
            core_state: [0; 2],
            queue: QueueRing::new(),
            secondary_update: false,
            index_distance: 0,
            scratch: 0,
            buffer_base: (regs::buffer::HIGH_MAIN as u16) << 8,
            buffer_offset: 0,
            extended_length: config.extended_length,
            last_transfer: None,
            dispatch_offset: None,
            pending: 0,
            secondary_counter: 0,
            status_helper: 0,
            state_field: 0,
            deferred: None,
            reset: None,
        }
    }

    /// Record a deferred request.
    ///
    /// An unconsumed request is only replaced by one of equal or higher
    /// priority.
    pub fn defer(&mut self, request: DeferredRequest) {
        match self.deferred {
            Some(current) if current.priority > request.priority => {
                log::trace!(
                    "defer: keeping flag {:#04x} over lower priority {:#04x}",
                    current.flag,
                    request.flag
                );
            }
            _ => {
                log::debug!(
                    "defer: target={} flag={:#04x} priority={}",
                    request.target,
                    request.flag,
                    request.priority
                );
                self.deferred = Some(request);
            }
        }
    }

    /// Peek at the pending retry record.
    pub fn deferred(&self) -> Option<DeferredRequest> {
        self.deferred
    }

    /// Consume the pending retry record.
    pub fn take_deferred(&mut self) -> Option<DeferredRequest> {
        self.deferred.take()
    }

    /// Terminal reset, once latched.
    pub fn reset_request(&self) -> Option<ResetRequest> {
        self.reset
    }

    pub(crate) fn latch_reset(&mut self, request: ResetRequest) {
        self.reset = Some(request);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════

/// Protocol counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Main-loop passes
    pub passes: u32,
    /// Status codes dispatched to the state machine
    pub actions: u32,
    /// Status codes ignored as idle
    pub idle: u32,
    /// Endpoint handler invocations
    pub endpoint_events: u32,
    /// Dispatch loops that ran out of budget
    pub dispatch_exhausted: u32,
    /// Gate outcomes other than proceed
    pub gate_rejects: u32,
    /// Deferred requests recorded
    pub deferred: u32,
    /// Completions processed without a transition
    pub completions: u32,
    /// Flash-control transitions
    pub resets: u32,
}

impl BridgeStats {
    pub const fn new() -> Self {
        Self {
            passes: 0,
            actions: 0,
            idle: 0,
            endpoint_events: 0,
            dispatch_exhausted: 0,
            gate_rejects: 0,
            deferred: 0,
            completions: 0,
            resets: 0,
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &mut u32) {
        *counter = counter.saturating_add(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════

/// Everything a component needs: the bus, the configuration, the state.
pub struct Context<B: RegisterBus> {
    pub bus: B,
    pub config: BridgeConfig,
    pub state: BridgeState,
    pub stats: BridgeStats,
}

impl<B: RegisterBus> Context<B> {
    pub fn new(bus: B, config: BridgeConfig) -> Self {
        Self {
            state: BridgeState::new(&config),
            bus,
            config,
            stats: BridgeStats::new(),
        }
    }

    /// Record a deferred request and count it.
    pub fn defer(&mut self, request: DeferredRequest) {
        self.state.defer(request);
        BridgeStats::bump(&mut self.stats.deferred);
    }

    /// Bounded wait for `addr & mask`.
    pub fn wait_bounded(&mut self, addr: u16, mask: u8, polls: u32) -> Result<()> {
        if self.bus.wait_until_bit(addr, mask, WaitTimeout::Polls(polls)) {
            Ok(())
        } else {
            Err(BridgeError::WaitTimeout { addr, mask })
        }
    }

    /// Hardware transfer-active bit.
    pub fn dma_active(&mut self) -> bool {
        self.bus.read_byte(regs::dma::STATUS) & regs::dma::status::ACTIVE != 0
    }
}
