//! # Kernel Driver Context
//!
//! [`KernelCore`] is the explicitly constructed context that owns every
//! piece of mutable driver state: the port bus, the controller pair, the
//! tick counter, the keyboard decoder and its event queue, and the clock
//! reader. It is built once, initialized once, and never torn down.
//!
//! ## Execution Contexts
//!
//! Two contexts share the core on a single CPU:
//!
//! | Context   | Entry points                         | May touch          |
//! |-----------|--------------------------------------|--------------------|
//! | interrupt | `handle_interrupt`                   | ticks, queue (push)|
//! | poll loop | `poll_event`, `read_clock`, `ticks`  | queue (pop), clock |
//!
//! The interrupt side never blocks and never reads the clock; the poll side
//! never decodes scan codes. The event queue is the only structure both
//! sides touch, under its single-producer/single-consumer discipline.
//!
//! ## Bring-up Order
//!
//! The boot layer installs all 48 vector table gates first, then calls
//! [`KernelCore::init`], then [`enable_interrupts`]. Unmasking lines before
//! the table is complete vectors through an absent gate and double-faults.

pub mod status;

use core::sync::atomic::{AtomicU64, Ordering};

use crate::devices::drivers::cmos_rtc::{CalendarTime, ClockError, CmosClock};
use crate::devices::drivers::ps2_keyboard::{KeyEvent, KeyboardDriver, ScanCodeSet, KBD_DATA_PORT};
use crate::devices::port::PortBus;
use crate::interrupts::dispatch::{
    Disposition, FaultPolicy, FaultReport, EXCEPTIONS, EXCEPTION_VECTOR_COUNT, IRQ_BASE_VECTOR,
    IRQ_LINE_COUNT, LINE_KEYBOARD, LINE_TIMER,
};
use crate::interrupts::pic::Pics;
use crate::interrupts::timer::Pit;
use crate::println;
use status::InitStatus;

/// Everything the core needs to know before bring-up.
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    /// Periodic interrupt rate for hardware line 0.
    pub timer_hz: u32,
    /// Hours added to the clock's stored time when reading it.
    pub timezone_offset_hours: u8,
    /// Raw encoding the keyboard decoder expects.
    pub scan_code_set: ScanCodeSet,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timer_hz: 100,
            timezone_offset_hours: 2,
            scan_code_set: ScanCodeSet::Set1,
        }
    }
}

/// The hardware-facing nucleus. Generic over the port bus so the whole
/// dispatch and device stack runs against the simulator in tests.
pub struct KernelCore<B: PortBus> {
    bus: B,
    pics: Pics,
    keyboard: KeyboardDriver,
    clock: CmosClock,
    ticks: AtomicU64,
    timer_hz: u32,
}

impl<B: PortBus> KernelCore<B> {
    pub fn new(bus: B, config: CoreConfig) -> Self {
        Self {
            bus,
            pics: Pics::new(),
            keyboard: KeyboardDriver::new(config.scan_code_set),
            clock: CmosClock::new(config.timezone_offset_hours),
            ticks: AtomicU64::new(0),
            timer_hz: config.timer_hz,
        }
    }

    /// Hardware bring-up, in order: serial console, interrupt controllers,
    /// interval timer, keyboard. The vector table must already be fully
    /// installed; interrupts stay globally disabled until the embedder
    /// calls [`enable_interrupts`] afterward.
    pub fn init(&mut self) {
        crate::SERIAL.lock().init();
        println!("kernel-core: starting hardware bring-up");

        status::register_component("Interrupt Controllers");
        status::register_component("Interval Timer");
        status::register_component("Keyboard");

        status::update_component_status("Interrupt Controllers", InitStatus::InProgress);
        self.pics.bring_up(&mut self.bus);
        status::update_component_status("Interrupt Controllers", InitStatus::Completed);
        println!("kernel-core: controllers remapped to vectors 32-47");

        status::update_component_status("Interval Timer", InitStatus::InProgress);
        Pit::configure(&mut self.bus, self.timer_hz);
        status::update_component_status("Interval Timer", InitStatus::Completed);
        println!("kernel-core: interval timer programmed to {} Hz", self.timer_hz);

        status::update_component_status("Keyboard", InitStatus::InProgress);
        self.keyboard.reset(&mut self.bus);
        status::update_component_status("Keyboard", InitStatus::Completed);
        println!("kernel-core: keyboard driver ready");
    }

    /// The dispatch entry point. The boot trampolines preserve CPU state,
    /// pass the vector (and the fault code for vectors that push one), and
    /// restore state when this returns.
    ///
    /// Exceptions come back as tagged outcomes; servicing a hardware line
    /// ends with the acknowledgment the controller requires. Vectors that
    /// were never installed fall through as handled strays.
    pub fn handle_interrupt(&mut self, vector: u8, error_code: u32) -> Disposition {
        if (vector as usize) < EXCEPTION_VECTOR_COUNT {
            let info = &EXCEPTIONS[vector as usize];
            let report = FaultReport {
                vector,
                name: info.name,
                error_code: info.has_error_code.then_some(error_code),
            };
            return match info.policy {
                FaultPolicy::Continue => Disposition::Continuable(report),
                FaultPolicy::Halt => Disposition::Fatal(report),
            };
        }

        if vector < IRQ_BASE_VECTOR + IRQ_LINE_COUNT {
            let line = vector - IRQ_BASE_VECTOR;
            match line {
                LINE_TIMER => {
                    self.ticks.fetch_add(1, Ordering::Relaxed);
                }
                LINE_KEYBOARD => {
                    let scancode = self.bus.read(KBD_DATA_PORT);
                    self.keyboard.handle_scancode(scancode);
                }
                _ => {} // unmasked-but-unhandled line: acknowledge only
            }
            self.pics.end_of_interrupt(&mut self.bus, line);
        }

        Disposition::Handled
    }

    /// Non-blocking: at most one decoded key event per call.
    pub fn poll_event(&self) -> Option<KeyEvent> {
        self.keyboard.poll_event()
    }

    /// Timer periods elapsed since bring-up.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Milliseconds since bring-up, derived from the tick counter.
    pub fn uptime_ms(&self) -> u64 {
        self.ticks() * 1_000 / self.timer_hz as u64
    }

    /// Read and normalize the battery-backed clock. Poll context only.
    pub fn read_clock(&mut self) -> Result<CalendarTime, ClockError> {
        self.clock.read(&mut self.bus)
    }

    /// Reinitialize the keyboard: decoder state, queued events, and any
    /// stale bytes sitting in the controller all get discarded.
    pub fn reset_keyboard(&mut self) {
        self.keyboard.reset(&mut self.bus);
    }

    /// Unmask or mask one hardware line.
    pub fn set_line_enabled(&mut self, line: u8, enabled: bool) {
        self.pics.set_line_enabled(&mut self.bus, line, enabled);
    }

    /// The underlying port bus, shared with drivers that live outside the
    /// core (and with test harnesses driving a simulated bus).
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

/// Log a fault report over serial. Pairs with [`halt_forever`] when the
/// dispatch outcome was fatal.
pub fn report_fault(report: &FaultReport) {
    match report.error_code {
        Some(code) => println!(
            "EXCEPTION: {} (vector {}, fault code {:#x})",
            report.name, report.vector, code
        ),
        None => println!("EXCEPTION: {} (vector {})", report.name, report.vector),
    }
}

/// Globally enable maskable interrupts. Call only after the vector table is
/// fully installed and [`KernelCore::init`] has run.
pub fn enable_interrupts() {
    x86_64::instructions::interrupts::enable();
}

/// Stop the CPU permanently: interrupts off, halt in a loop.
pub fn halt_forever() -> ! {
    x86_64::instructions::interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}

/// Controlled termination: disable interrupts, then try the emulator exit
/// device and the ACPI sleep register in turn. Real hardware may honor
/// neither, so the fallback is a permanent halt.
pub fn shutdown() -> ! {
    use x86_64::instructions::port::Port;

    println!("kernel-core: shutting down");
    x86_64::instructions::interrupts::disable();

    unsafe {
        // emulator debug-exit device
        Port::<u32>::new(0xF4).write(0x31);
        io_settle_delay();

        // ACPI PM1a sleep control
        Port::<u16>::new(0x604).write(0x2000);
        io_settle_delay();
    }

    halt_forever()
}

/// Crude settle loop between shutdown attempts; there is no timer to wait
/// on once interrupts are off.
fn io_settle_delay() {
    for _ in 0..10_000 {
        core::hint::spin_loop();
    }
}
