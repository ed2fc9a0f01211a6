//! Bridge configuration.

/// Code returned by the simple queue path.
///
/// The controller firmware returns 0x0A here; a later patch changed the
/// value to 0x05, which collides with the defer code. Both are kept so a
/// build can match the image it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InProgressCode {
    Reference = 0x0A,
    Patched = 0x05,
}

impl InProgressCode {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Simple-path return code
    pub in_progress: InProgressCode,
    /// Initial extended-length source for the DMA configurator
    pub extended_length: u8,
    /// Completion window wait, base polls
    pub completion_timeout_base: u32,
    /// Completion window wait, extra polls per secondary counter step
    pub completion_timeout_step: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::reference()
    }
}

impl BridgeConfig {
    /// Behavior of the unpatched controller firmware.
    pub const fn reference() -> Self {
        Self {
            in_progress: InProgressCode::Reference,
            extended_length: 0x40,
            completion_timeout_base: 1000,
            completion_timeout_step: 250,
        }
    }

    /// Reference behavior with the in-progress patch applied.
    pub const fn patched() -> Self {
        Self {
            in_progress: InProgressCode::Patched,
            ..Self::reference()
        }
    }

    /// Poll budget for the completion window at `counter`.
    pub const fn completion_timeout(&self, counter: u8) -> u32 {
        self.completion_timeout_base
            .saturating_add(self.completion_timeout_step.saturating_mul(counter as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(BridgeConfig::default(), BridgeConfig::reference());
        assert_eq!(BridgeConfig::reference().in_progress.code(), 0x0A);
        assert_eq!(BridgeConfig::patched().in_progress.code(), 0x05);
        assert_eq!(
            BridgeConfig::patched().extended_length,
            BridgeConfig::reference().extended_length
        );
    }

    #[test]
    fn test_completion_timeout() {
        let config = BridgeConfig::reference();
        assert_eq!(config.completion_timeout(0), 1000);
        assert_eq!(config.completion_timeout(3), 1750);

        let huge = BridgeConfig {
            completion_timeout_base: u32::MAX,
            ..config
        };
        assert_eq!(huge.completion_timeout(7), u32::MAX);
    }
}
