//! Register bus interface.
//!
//! The protocol core reaches hardware through exactly three operations:
//! read a byte, write a byte, wait until a bit is set. Board support
//! implements them against real MMIO; `SimBus` (with the `std` feature)
//! implements them against a simulated register file.

/// How long `wait_until_bit` may spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Give up after this many polls.
    Polls(u32),
    /// Spin until the bit appears.
    ///
    /// Used for DMA-engine and link readiness. Hardware that never raises
    /// the bit livelocks the caller.
    Forever,
}

/// Byte-wide register access.
pub trait RegisterBus {
    /// Read a register.
    fn read_byte(&mut self, addr: u16) -> u8;

    /// Write a register.
    fn write_byte(&mut self, addr: u16, value: u8);

    /// Spin until `read_byte(addr) & mask != 0`.
    ///
    /// # Returns
    /// - `true`: bit observed
    /// - `false`: `WaitTimeout::Polls` budget exhausted
    fn wait_until_bit(&mut self, addr: u16, mask: u8, timeout: WaitTimeout) -> bool;

    /// Read-modify-write: `(old & !clear) | set`.
    #[inline]
    fn modify_byte(&mut self, addr: u16, clear: u8, set: u8) {
        let old = self.read_byte(addr);
        self.write_byte(addr, (old & !clear) | set);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_byte(&mut self, addr: u16) -> u8 {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        (**self).write_byte(addr, value)
    }

    fn wait_until_bit(&mut self, addr: u16, mask: u8, timeout: WaitTimeout) -> bool {
        (**self).wait_until_bit(addr, mask, timeout)
    }
}

/// Poll-loop implementation of `wait_until_bit` for buses whose registers
/// change on their own (real MMIO).
pub fn spin_until_bit<B: RegisterBus + ?Sized>(
    bus: &mut B,
    addr: u16,
    mask: u8,
    timeout: WaitTimeout,
) -> bool {
    match timeout {
        WaitTimeout::Polls(budget) => {
            for _ in 0..budget {
                if bus.read_byte(addr) & mask != 0 {
                    return true;
                }
                core::hint::spin_loop();
            }
            false
        }
        WaitTimeout::Forever => loop {
            if bus.read_byte(addr) & mask != 0 {
                return true;
            }
            core::hint::spin_loop();
        },
    }
}
