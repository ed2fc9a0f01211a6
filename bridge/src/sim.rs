//! Simulated register file.
//!
//! A flat 64 KiB byte space implementing [`RegisterBus`] for host-side
//! testing and bring-up. Fixed-size, no allocation. Built only with the
//! `std` feature or under `cfg(test)`.
//!
//! Beyond plain memory it models the two hardware behaviors the protocol
//! core depends on:
//! - write-1-to-clear registers (endpoint acknowledge)
//! - readiness bits that the hardware raises while the firmware waits
//!
//! Every write is journaled so tests can check ordering.

use crate::bus::{self, RegisterBus, WaitTimeout};
use crate::regs;

/// Journal capacity; later writes are counted but not stored.
pub const JOURNAL_LEN: usize = 512;

/// Write-1-to-clear register capacity.
pub const MAX_W1C: usize = 16;

/// Scripted readiness capacity.
pub const MAX_SCRIPTS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct ReadyScript {
    addr: u16,
    mask: u8,
    /// Waits left before the bit appears
    after_waits: u32,
    active: bool,
}

/// Simulated register file.
pub struct SimBus {
    mem: [u8; 0x1_0000],
    journal: [(u16, u8); JOURNAL_LEN],
    writes: usize,
    w1c: [u16; MAX_W1C],
    w1c_len: usize,
    scripts: [ReadyScript; MAX_SCRIPTS],
    waits: u32,
}

impl SimBus {
    /// All registers zero.
    pub fn new() -> Self {
        Self {
            mem: [0; 0x1_0000],
            journal: [(0, 0); JOURNAL_LEN],
            writes: 0,
            w1c: [0; MAX_W1C],
            w1c_len: 0,
            scripts: [ReadyScript {
                addr: 0,
                mask: 0,
                after_waits: 0,
                active: false,
            }; MAX_SCRIPTS],
            waits: 0,
        }
    }

    /// Board state after power-up: link up and trained, DMA engine idle,
    /// endpoint secondary status registers write-1-to-clear.
    pub fn powered() -> Self {
        let mut sim = Self::new();
        sim.poke(
            regs::backend::LINK_STATUS,
            regs::backend::link::UP | regs::backend::link::TRAINED,
        );
        sim.poke(regs::dma::READY, regs::dma::ready::IDLE);
        for group in 0..8 {
            sim.mark_w1c(regs::endpoint::BASE + group);
        }
        sim
    }

    /// Set a register without journaling (hardware side).
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.mem[addr as usize] = value;
    }

    /// Read a register without side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    /// Treat writes to `addr` as write-1-to-clear. Ignored once full.
    pub fn mark_w1c(&mut self, addr: u16) {
        if self.w1c_len < MAX_W1C && !self.is_w1c(addr) {
            self.w1c[self.w1c_len] = addr;
            self.w1c_len += 1;
        }
    }

    /// Raise `mask` at `addr` once the firmware has waited on it
    /// `after_waits` times. Ignored once full.
    pub fn raise_on_wait(&mut self, addr: u16, mask: u8, after_waits: u32) {
        if let Some(script) = self.scripts.iter_mut().find(|s| !s.active) {
            *script = ReadyScript {
                addr,
                mask,
                after_waits,
                active: true,
            };
        }
    }

    /// Journaled writes, oldest first.
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.journal[..self.writes.min(JOURNAL_LEN)]
    }

    /// Total writes, including those past the journal.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Journal position of the first write to `addr`.
    pub fn first_write(&self, addr: u16) -> Option<usize> {
        self.writes().iter().position(|&(a, _)| a == addr)
    }

    /// All values written to `addr`, in order.
    pub fn writes_to(&self, addr: u16) -> impl Iterator<Item = u8> + '_ {
        self.writes()
            .iter()
            .filter(move |&&(a, _)| a == addr)
            .map(|&(_, v)| v)
    }

    /// Number of `wait_until_bit` calls.
    pub fn wait_count(&self) -> u32 {
        self.waits
    }

    /// Forget journaled writes and wait count.
    pub fn clear_journal(&mut self) {
        self.writes = 0;
        self.waits = 0;
    }

    fn is_w1c(&self, addr: u16) -> bool {
        self.w1c[..self.w1c_len].contains(&addr)
    }

    fn run_scripts(&mut self, addr: u16) {
        for i in 0..MAX_SCRIPTS {
            let script = self.scripts[i];
            if !script.active || script.addr != addr {
                continue;
            }
            if script.after_waits == 0 {
                self.mem[addr as usize] |= script.mask;
                self.scripts[i].active = false;
            } else {
                self.scripts[i].after_waits -= 1;
            }
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for SimBus {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        if self.writes < JOURNAL_LEN {
            self.journal[self.writes] = (addr, value);
        }
        self.writes += 1;

        if self.is_w1c(addr) {
            self.mem[addr as usize] &= !value;
        } else {
            self.mem[addr as usize] = value;
        }
    }

    /// # Panics
    /// A `Forever` wait on a bit that is clear and not scripted would spin
    /// for good on hardware; the simulator panics instead.
    fn wait_until_bit(&mut self, addr: u16, mask: u8, timeout: WaitTimeout) -> bool {
        self.waits += 1;
        self.run_scripts(addr);

        match timeout {
            WaitTimeout::Polls(_) => bus::spin_until_bit(self, addr, mask, timeout),
            WaitTimeout::Forever => {
                if self.mem[addr as usize] & mask == 0 {
                    panic!(
                        "unbounded wait on {:#06x} & {:#04x} would never complete",
                        addr, mask
                    );
                }
                true
            }
        }
    }
}
