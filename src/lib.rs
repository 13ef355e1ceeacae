//! # kernel-core
//!
//! The hardware-facing nucleus of a single-CPU, protected-mode kernel:
//! everything between raw interrupt vectors and the polled events a shell
//! or display consumes.
//!
//! ## What Lives Here
//!
//! | Concern                  | Module                            |
//! |--------------------------|-----------------------------------|
//! | vector table             | `interrupts::idt`                 |
//! | controller bring-up, EOI | `interrupts::pic`                 |
//! | interval timer, ticks    | `interrupts::timer`               |
//! | dispatch + fault policy  | `interrupts::dispatch`, `kernel`  |
//! | keyboard decode + queue  | `devices::drivers::ps2_keyboard`  |
//! | calendar clock           | `devices::drivers::cmos_rtc`      |
//! | port access              | `devices::port`                   |
//!
//! ## What Does Not
//!
//! Display rendering, command parsing, the file store, and the assembly
//! trampolines that bridge raw vectors into [`KernelCore::handle_interrupt`]
//! are the embedding kernel's problem. So are scheduling, virtual memory,
//! and anything multi-core.
//!
//! ## Usage
//!
//! ```ignore
//! let mut idt = Idt::new();
//! for (vector, stub) in trampolines() {
//!     idt.install(vector, stub, KERNEL_CODE_SELECTOR, INTERRUPT_GATE_FLAGS);
//! }
//! // boot layer: lidt(idt.pointer())
//!
//! let mut core = KernelCore::new(X86PortBus, CoreConfig::default());
//! core.init();
//! kernel::enable_interrupts();
//!
//! loop {
//!     while let Some(key) = core.poll_event() {
//!         shell.feed(key.character);
//!     }
//! }
//! ```

#![no_std]

#[cfg(feature = "sim")]
extern crate alloc;

use spin::Mutex;
use uart_16550::SerialPort;

pub mod devices;
pub mod interrupts;
pub mod kernel;

pub use devices::drivers::cmos_rtc::{CalendarTime, ClockError};
pub use devices::drivers::ps2_keyboard::{KeyEvent, ScanCodeSet};
pub use devices::port::{PortBus, X86PortBus};
pub use interrupts::dispatch::{Disposition, FaultReport};
pub use interrupts::idt::{Idt, INTERRUPT_GATE_FLAGS, KERNEL_CODE_SELECTOR};
pub use kernel::{CoreConfig, KernelCore};

/// Debug console on COM1. Initialized by [`KernelCore::init`].
pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut serial = $crate::SERIAL.lock();
        let _ = writeln!(serial, $($arg)*);
    }};
}
