//! Common test utilities: a powered-up controller and transport staging.

use morpheus_bridge::regs;
use morpheus_bridge::{
    BridgeConfig, Controller, DispatchOffset, EndpointHandler, PollResult, QueueOutcome, SimBus,
};

/// Controller over a powered-up simulated board.
pub fn powered(config: BridgeConfig) -> Controller<SimBus> {
    Controller::new(SimBus::powered(), config)
}

/// Host transport request as seen in the transport registers.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub status: u8,
    pub param1: u8,
    pub param2: u8,
    pub core: [u8; 2],
    pub flags: u8,
}

#[allow(dead_code)]
impl Request {
    pub fn new(status: u8) -> Self {
        Self {
            status,
            param1: 0x01,
            param2: 0x40,
            core: [0x11, 0x22],
            flags: 0,
        }
    }

    pub fn params(mut self, param1: u8, param2: u8) -> Self {
        self.param1 = param1;
        self.param2 = param2;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn stage(&self, bus: &mut SimBus) {
        bus.poke(regs::transport::STATUS, self.status);
        bus.poke(regs::transport::PARAM1, self.param1);
        bus.poke(regs::transport::PARAM2, self.param2);
        bus.poke(regs::transport::CORE_LO, self.core[0]);
        bus.poke(regs::transport::CORE_HI, self.core[1]);
        bus.poke(regs::transport::FLAGS, self.flags);
    }
}

/// Stage `request` and run one pass; returns the queue outcome.
#[allow(dead_code)]
pub fn submit(controller: &Controller<SimBus>, request: Request) -> Option<QueueOutcome> {
    controller.with_context(|ctx| request.stage(&mut ctx.bus));
    match controller.poll_once(&mut Recorder::default()) {
        PollResult::Pass { action, .. } => action,
        PollResult::Reset(request) => panic!("controller latched: {:?}", request),
    }
}

/// Endpoint handler that records every dispatch offset.
#[derive(Debug, Default)]
pub struct Recorder {
    pub offsets: Vec<u8>,
}

impl EndpointHandler<SimBus> for Recorder {
    fn handle(&mut self, offset: DispatchOffset, _bus: &mut SimBus) {
        self.offsets.push(offset.0);
    }
}
