//! MorpheusX Storage Bridge Core
//!
//! Protocol state machine and queue/DMA coordination for a bridge
//! controller that moves block-storage commands between the host-facing
//! transport and the backend command-queue engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Controller (spin lock)                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  poll_once ──▶ classifier ──▶ queue ──▶ gate                     │
//! │      │                          │                                │
//! │      │                          └──────▶ dma (configurator)      │
//! │      │                                                           │
//! │      └──────▶ dispatch ──▶ tables ──▶ EndpointHandler            │
//! │                                                                  │
//! │  on_completion ──▶ completion ──▶ flash control (terminal)       │
//! │                                                                  │
//! └──────────────────────────────┬───────────────────────────────────┘
//!                                │
//!                     RegisterBus (read / write / wait)
//! ```
//!
//! Every component works on an explicit [`Context`]; there is no hidden
//! global state. Hardware access goes exclusively through the three
//! operations of [`RegisterBus`].
//!
//! # Usage
//!
//! ```ignore
//! use morpheus_bridge::{BridgeConfig, Controller, PollResult};
//!
//! let controller = Controller::new(bus, BridgeConfig::reference());
//!
//! loop {
//!     match controller.poll_once(&mut endpoint_handler) {
//!         PollResult::Pass { .. } => {}
//!         PollResult::Reset(request) => platform_reset(request),
//!     }
//! }
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod bus;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod dma;
pub mod error;
pub mod gate;
pub mod queue;
pub mod regs;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod tables;
pub mod types;

pub use bus::{RegisterBus, WaitTimeout};
pub use completion::{CompletionOutcome, ResetRequest};
pub use config::{BridgeConfig, InProgressCode};
pub use context::{BridgeState, BridgeStats, Context};
pub use controller::{Controller, PollResult};
pub use dispatch::{DispatchSummary, EndpointHandler};
pub use dma::TransferParameters;
pub use error::{BridgeError, Result};
pub use gate::GateOutcome;
pub use queue::{QueueOutcome, QueueRing, QueueSlot};
#[cfg(any(test, feature = "std"))]
pub use sim::SimBus;
pub use types::{
    ActionCode, DeferredRequest, DispatchOffset, EndpointIndex, SlotControl, SlotIndex,
    StatusCode, TransferFlags,
};
