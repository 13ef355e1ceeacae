//! # Programmable Interrupt Controller (8259 pair)
//!
//! Bring-up and runtime control of the two cascaded 8259 chips.
//!
//! ## PIC Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  Primary    │◀────│  Secondary  │
//! │  lines 0-7  │ IRQ2│  lines 8-15 │
//! └──────┬──────┘     └─────────────┘
//!        ▼
//!       CPU
//! ```
//!
//! ## Vector Remapping
//!
//! At reset the controllers deliver lines on vectors that collide with CPU
//! exceptions, so bring-up remaps them:
//! - Primary: vectors 32-39 (lines 0-7)
//! - Secondary: vectors 40-47 (lines 8-15)
//!
//! The initialization words must land in the exact ICW1 → ICW2 → ICW3 →
//! ICW4 order; the chips interpret data-port writes positionally during the
//! sequence. There is no status readback, so a failed bring-up is not
//! observable from software.

use crate::devices::port::PortBus;

pub const PIC_1_OFFSET: u8 = 32; // primary handles lines 0-7
pub const PIC_2_OFFSET: u8 = 40; // secondary handles lines 8-15

pub const PRIMARY_COMMAND: u16 = 0x20;
pub const PRIMARY_DATA: u16 = 0x21;
pub const SECONDARY_COMMAND: u16 = 0xA0;
pub const SECONDARY_DATA: u16 = 0xA1;

/// ICW1: begin initialization, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW3 to the primary: the secondary hangs off line 2.
const ICW3_CASCADE_ON_LINE_2: u8 = 0x04;
/// ICW3 to the secondary: its own cascade identity.
const ICW3_CASCADE_IDENTITY: u8 = 0x02;
/// ICW4: 8086-compatible operating mode.
const ICW4_8086_MODE: u8 = 0x01;

/// Initial primary mask: only lines 0 (timer) and 1 (keyboard) enabled.
const INITIAL_PRIMARY_MASK: u8 = 0xFC;
/// Initial secondary mask: everything disabled.
const INITIAL_SECONDARY_MASK: u8 = 0xFF;

/// End-of-interrupt command code.
const EOI: u8 = 0x20;

/// Highest valid hardware line number.
const LINE_MAX: u8 = 15;

/// The cascaded controller pair. The vector bases are fixed at
/// construction and never change after bring-up.
#[derive(Debug, Clone, Copy)]
pub struct Pics {
    primary_base: u8,
    secondary_base: u8,
}

impl Pics {
    pub const fn new() -> Self {
        Self {
            primary_base: PIC_1_OFFSET,
            secondary_base: PIC_2_OFFSET,
        }
    }

    /// Vector number a hardware line arrives on after remapping.
    pub fn vector_for_line(&self, line: u8) -> u8 {
        self.primary_base + line
    }

    /// Run the full initialization sequence.
    ///
    /// Order is a hardware contract: ICW1 to both command ports, then ICW2
    /// (vector bases), ICW3 (cascade wiring) and ICW4 (8086 mode) to both
    /// data ports, then the initial line masks.
    pub fn bring_up(&self, bus: &mut impl PortBus) {
        bus.write(PRIMARY_COMMAND, ICW1_INIT);
        bus.write(SECONDARY_COMMAND, ICW1_INIT);

        bus.write(PRIMARY_DATA, self.primary_base);
        bus.write(SECONDARY_DATA, self.secondary_base);

        bus.write(PRIMARY_DATA, ICW3_CASCADE_ON_LINE_2);
        bus.write(SECONDARY_DATA, ICW3_CASCADE_IDENTITY);

        bus.write(PRIMARY_DATA, ICW4_8086_MODE);
        bus.write(SECONDARY_DATA, ICW4_8086_MODE);

        bus.write(PRIMARY_DATA, INITIAL_PRIMARY_MASK);
        bus.write(SECONDARY_DATA, INITIAL_SECONDARY_MASK);
    }

    /// Unmask or mask one hardware line. Lines above 15 are a no-op.
    pub fn set_line_enabled(&self, bus: &mut impl PortBus, line: u8, enabled: bool) {
        if line > LINE_MAX {
            return;
        }
        let (data_port, bit) = if line < 8 {
            (PRIMARY_DATA, line)
        } else {
            (SECONDARY_DATA, line - 8)
        };
        let mask = bus.read(data_port);
        let mask = if enabled {
            mask & !(1 << bit)
        } else {
            mask | (1 << bit)
        };
        bus.write(data_port, mask);
    }

    /// Acknowledge a serviced line. Lines on the secondary acknowledge both
    /// controllers, secondary first; the primary is always acknowledged.
    pub fn end_of_interrupt(&self, bus: &mut impl PortBus, line: u8) {
        if line >= 8 {
            bus.write(SECONDARY_COMMAND, EOI);
        }
        bus.write(PRIMARY_COMMAND, EOI);
    }
}

impl Default for Pics {
    fn default() -> Self {
        Self::new()
    }
}
