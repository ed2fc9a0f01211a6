//! Bridge controller.
//!
//! Owns the [`Context`] behind a single spin lock. The main-loop pass and
//! the completion handler each hold the lock for their whole section,
//! which is what the controller firmware gets from masking interrupts.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ poll_once / on_completion ... ──▶ flash-control reset (latched)
//!                                              │
//!                                              └──▶ every later call: Reset
//! ```

use spin::Mutex;

use crate::bus::RegisterBus;
use crate::classifier;
use crate::completion::{self, CompletionOutcome, ResetRequest};
use crate::config::BridgeConfig;
use crate::context::{BridgeStats, Context};
use crate::dispatch::{self, DispatchSummary, EndpointHandler};
use crate::error::{BridgeError, Result};
use crate::queue::QueueOutcome;
use crate::types::DeferredRequest;

/// Result of one main-loop pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Pass {
        /// Queue outcome, `None` when the transport was idle
        action: Option<QueueOutcome>,
        endpoints: DispatchSummary,
    },
    /// Controller is latched; the platform must reset
    Reset(ResetRequest),
}

/// Lock-protected bridge controller.
pub struct Controller<B: RegisterBus> {
    inner: Mutex<Context<B>>,
}

impl<B: RegisterBus> Controller<B> {
    pub fn new(bus: B, config: BridgeConfig) -> Self {
        log::info!(
            "bridge: register map v{}, in-progress code {:#04x}",
            crate::regs::REGISTER_MAP_VERSION,
            config.in_progress.code()
        );
        Self {
            inner: Mutex::new(Context::new(bus, config)),
        }
    }

    /// One main-loop pass: classify the transport status, then service
    /// ready endpoints.
    pub fn poll_once<H>(&self, handler: &mut H) -> PollResult
    where
        H: EndpointHandler<B> + ?Sized,
    {
        let mut guard = self.inner.lock();
        let ctx = &mut *guard;
        if let Some(request) = ctx.state.reset_request() {
            return PollResult::Reset(request);
        }

        BridgeStats::bump(&mut ctx.stats.passes);
        let action = classifier::classify(ctx);
        let endpoints = dispatch::run(ctx, handler);
        PollResult::Pass { action, endpoints }
    }

    /// Handle a completion event.
    ///
    /// # Errors
    /// [`BridgeError::ResetLatched`] once a flash-control transition has
    /// fired; the event is not processed.
    pub fn on_completion(&self, event: u8) -> Result<CompletionOutcome> {
        let mut guard = self.inner.lock();
        if guard.state.reset_request().is_some() {
            return Err(BridgeError::ResetLatched);
        }
        Ok(completion::handle(&mut *guard, event))
    }

    /// Consume the pending retry record.
    pub fn take_deferred(&self) -> Option<DeferredRequest> {
        self.inner.lock().state.take_deferred()
    }

    pub fn stats(&self) -> BridgeStats {
        self.inner.lock().stats
    }

    pub fn reset_request(&self) -> Option<ResetRequest> {
        self.inner.lock().state.reset_request()
    }

    /// Run `f` with the lock held.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut Context<B>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    pub fn into_inner(self) -> Context<B> {
        self.inner.into_inner()
    }
}
