//! # Interrupt Handling Module
//!
//! Interrupt infrastructure for the kernel core:
//!
//! - **IDT**: the 48-entry vector table the boot layer loads
//! - **PIC**: cascaded 8259 bring-up, line masking, and acknowledgment
//! - **Timer**: interval timer programming and the tick source
//! - **Dispatch**: vector classification tables and outcome types
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Handling                    |
//! |--------|------------------------|-----------------------------|
//! | 0-31   | CPU exceptions         | per-vector policy table     |
//! | 32     | timer (line 0)         | tick counter                |
//! | 33     | keyboard (line 1)      | scan-code decode + queue    |
//! | 34-47  | other hardware lines   | acknowledged, no device     |
//!
//! The assembly trampolines behind each gate are owned by the boot layer;
//! they save CPU state, call the dispatch entry point with the vector (and
//! fault code where the CPU pushes one), and restore state after it
//! returns.

pub mod dispatch;
pub mod idt;
pub mod pic;
pub mod timer;
