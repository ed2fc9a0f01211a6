//! Bridge register map.
//!
//! Byte-wide registers as seen through [`RegisterBus`](crate::RegisterBus).
//! Only the fields the protocol core touches are named here; everything
//! else belongs to the init-table interpreter and the per-register
//! accessors outside this crate.

/// Revision of the register contract below. Bump on any address or bit
/// change so firmware images and board support stay in lockstep.
pub const REGISTER_MAP_VERSION: u8 = 1;

/// Host-facing command/transport block
pub mod transport {
    /// Status code driving the event classifier
    pub const STATUS: u16 = 0x9000;
    /// First command parameter (segment count)
    pub const PARAM1: u16 = 0x9001;
    /// Second command parameter (byte count)
    pub const PARAM2: u16 = 0x9002;
    /// Core state pair, low byte
    pub const CORE_LO: u16 = 0x9003;
    /// Core state pair, high byte
    pub const CORE_HI: u16 = 0x9004;
    /// Transport control flags
    pub const FLAGS: u16 = 0x9005;

    pub mod flags {
        /// Secondary transport flag, dropped while a command state is active
        pub const SECONDARY: u8 = 1 << 2;
    }
}

/// Host-transport endpoint event block
pub mod endpoint {
    /// Endpoint-status bitmap (one bit per endpoint group)
    pub const STATUS: u16 = 0x9100;
    /// Per-group secondary status bytes, write-1-to-clear
    pub const BASE: u16 = 0x9110;
}

/// Backend command-queue engine
pub mod backend {
    /// Link status
    pub const LINK_STATUS: u16 = 0xC000;
    /// Link control (recovery, setup)
    pub const LINK_CTRL: u16 = 0xC001;
    /// Queue depth; top bit flags a full queue
    pub const QUEUE_DEPTH: u16 = 0xC002;
    /// Engine status
    pub const STATUS: u16 = 0xC003;
    /// Rolling status byte indexing the gate state table
    pub const ROLLING_STATUS: u16 = 0xC004;
    /// Device status
    pub const DEVICE_STATUS: u16 = 0xC005;
    /// First command count register
    pub const COUNT_A: u16 = 0xC006;
    /// Second command count register
    pub const COUNT_B: u16 = 0xC007;
    /// Queue control
    pub const QUEUE_CTRL: u16 = 0xC008;
    /// Backend head index (5 bits)
    pub const HEAD: u16 = 0xC009;
    /// Issue pointer (index-counter pointer)
    pub const ISSUE: u16 = 0xC00A;
    /// First slot register block
    pub const SLOT_BASE: u16 = 0xC100;
    /// Bytes per slot register block
    pub const SLOT_STRIDE: u16 = 4;

    pub mod link {
        pub const UP: u8 = 1 << 0;
        pub const TRAINED: u8 = 1 << 1;
        pub const RECOVER: u8 = 1 << 0;
        pub const SETUP: u8 = 1 << 1;
    }

    pub mod depth {
        /// Queue full
        pub const FULL: u8 = 1 << 7;
        /// Depth value reported once the backend has drained
        pub const DRAINED: u8 = 4;
    }

    pub mod status {
        pub const BUSY: u8 = 1 << 0;
    }

    pub mod device {
        /// Command pending, cleared when a slot is programmed
        pub const PENDING: u8 = 1 << 0;
    }

    pub mod queue {
        /// Command in flight across segments
        pub const BUSY: u8 = 1 << 0;
        /// Secondary queue-state update request
        pub const SECONDARY_UPDATE: u8 = 1 << 1;
    }

    /// Offsets inside one slot register block
    pub mod slot {
        pub const CONTROL: u16 = 0;
        pub const COUNT: u16 = 1;
        pub const STATUS: u16 = 2;
        /// Masked status field inside `STATUS`
        pub const STATUS_MASK: u8 = 0x0F;
    }
}

/// Shared DMA engine
pub mod dma {
    /// Transfer mode
    pub const MODE: u16 = 0xB000;
    /// Source address pair
    pub const SRC_LO: u16 = 0xB001;
    pub const SRC_HI: u16 = 0xB002;
    /// Destination address pair (mirror of source)
    pub const DST_LO: u16 = 0xB003;
    pub const DST_HI: u16 = 0xB004;
    /// Channel control; top two bits belong to the engine
    pub const CONTROL: u16 = 0xB005;
    /// Tag/status block
    pub const TAG: u16 = 0xB008;
    pub const TAG_LEN: u16 = 4;
    /// Trailing control byte after the tag block
    pub const TRAILER: u16 = 0xB00C;
    /// Buffer-control mode
    pub const BUF_MODE: u16 = 0xB00D;
    /// Extended length byte
    pub const LENGTH: u16 = 0xB00E;
    /// Hardware-reported address pair
    pub const HW_ADDR_LO: u16 = 0xB010;
    pub const HW_ADDR_HI: u16 = 0xB011;
    /// Second buffer-address pair
    pub const BUF2_LO: u16 = 0xB012;
    pub const BUF2_HI: u16 = 0xB013;
    /// Derived buffer offset
    pub const BUF_OFFSET: u16 = 0xB014;
    /// DMA status
    pub const STATUS: u16 = 0xB018;
    /// Engine readiness
    pub const READY: u16 = 0xB019;
    /// Transfer status reported to the completion path
    pub const XFER_STATUS: u16 = 0xB01A;

    /// Keep mask for `CONTROL`
    pub const CONTROL_KEEP: u8 = 0xC0;

    pub mod mode {
        /// Fixed mode for mirrored buffer transfers
        pub const MIRRORED: u8 = 0x20;
        /// Direct channel marker
        pub const DIRECT: u8 = 0x80;
    }

    pub mod buf_mode {
        pub const NORMAL: u8 = 0x03;
        pub const EXTENDED: u8 = 0x04;
    }

    pub mod status {
        /// Transfer running
        pub const ACTIVE: u8 = 1 << 0;
        /// Two latch bits toggled by the completion path
        pub const LATCH: u8 = 0x30;
        /// Fixed marker re-applied for mirrored normal-mode transfers
        pub const MARKER: u8 = 1 << 6;
    }

    pub mod ready {
        pub const IDLE: u8 = 1 << 0;
    }
}

/// Completion state windows
pub mod completion {
    /// Window base when no event is pending
    pub const BASE_IDLE: u16 = 0xB100;
    /// Window base when an event is pending
    pub const BASE_PENDING: u16 = 0xB180;
    /// Bytes per counter step
    pub const STRIDE: u16 = 4;
    /// Window readiness bit
    pub const READY: u8 = 1 << 7;
    /// State flags inside a window byte
    pub const STATE_MASK: u8 = 0x07;
}

/// Flash control
pub mod flash {
    /// Target state written before the trigger
    pub const TARGET: u16 = 0xA000;
    /// Control; writing `GO` never returns on real hardware
    pub const CONTROL: u16 = 0xA001;
    pub const GO: u8 = 1 << 7;
}

/// On-chip buffer
pub mod buffer {
    /// High byte of the main buffer window
    pub const HIGH_MAIN: u8 = 0x80;
    /// High byte of the alternate buffer window
    pub const HIGH_ALT: u8 = 0xA0;
}
