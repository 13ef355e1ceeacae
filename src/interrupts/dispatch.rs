//! # Interrupt Classification
//!
//! The fixed tables and outcome types behind the dispatch entry point
//! ([`crate::kernel::KernelCore::handle_interrupt`]).
//!
//! ## Vector Space
//!
//! | Vectors | Meaning              | Path                                |
//! |---------|----------------------|-------------------------------------|
//! | 0-31    | CPU exception        | report, then halt unless continuable|
//! | 32-47   | hardware line 0-15   | device handler + acknowledgment     |
//! | 48-255  | never installed      | stray: ignored                      |
//!
//! ## Exception Policy
//!
//! Whether a vector is survivable is data, not control flow: every
//! exception has a [`FaultPolicy`] entry in [`EXCEPTIONS`]. Today the page
//! fault is the single continuable entry (nothing can recover it yet, but
//! the main loop is allowed to keep running); flipping a policy means
//! editing the table, not finding a buried special case.

/// Number of CPU exception vectors.
pub const EXCEPTION_VECTOR_COUNT: usize = 32;

/// First vector carrying a hardware line after remapping.
pub const IRQ_BASE_VECTOR: u8 = super::pic::PIC_1_OFFSET;

/// Number of hardware lines behind the controller pair.
pub const IRQ_LINE_COUNT: u8 = 16;

/// Hardware line numbers with dedicated device handlers.
pub const LINE_TIMER: u8 = 0;
pub const LINE_KEYBOARD: u8 = 1;

/// What the kernel does after reporting an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Irrecoverable: report, then stop the machine.
    Halt,
    /// Survivable: report and let the main loop resume.
    Continue,
}

/// Static description of one exception vector.
pub struct ExceptionInfo {
    pub name: &'static str,
    /// Whether the CPU pushes a fault code for this vector.
    pub has_error_code: bool,
    pub policy: FaultPolicy,
}

const fn fatal(name: &'static str, has_error_code: bool) -> ExceptionInfo {
    ExceptionInfo {
        name,
        has_error_code,
        policy: FaultPolicy::Halt,
    }
}

/// The 32 architectural exception vectors, in vector order.
pub static EXCEPTIONS: [ExceptionInfo; EXCEPTION_VECTOR_COUNT] = [
    fatal("Divide Error", false),                // 0
    fatal("Debug", false),                       // 1
    fatal("Non-Maskable Interrupt", false),      // 2
    fatal("Breakpoint", false),                  // 3
    fatal("Overflow", false),                    // 4
    fatal("Bound Range Exceeded", false),        // 5
    fatal("Invalid Opcode", false),              // 6
    fatal("Device Not Available", false),        // 7
    fatal("Double Fault", true),                 // 8
    fatal("Coprocessor Segment Overrun", false), // 9
    fatal("Invalid TSS", true),                  // 10
    fatal("Segment Not Present", true),          // 11
    fatal("Stack-Segment Fault", true),          // 12
    fatal("General Protection Fault", true),     // 13
    ExceptionInfo {
        name: "Page Fault", // 14
        has_error_code: true,
        policy: FaultPolicy::Continue,
    },
    fatal("Reserved", false),                     // 15
    fatal("x87 Floating-Point Error", false),     // 16
    fatal("Alignment Check", true),               // 17
    fatal("Machine Check", false),                // 18
    fatal("SIMD Floating-Point Exception", false), // 19
    fatal("Virtualization Exception", false),     // 20
    fatal("Control Protection Exception", true),  // 21
    fatal("Reserved", false),                     // 22
    fatal("Reserved", false),                     // 23
    fatal("Reserved", false),                     // 24
    fatal("Reserved", false),                     // 25
    fatal("Reserved", false),                     // 26
    fatal("Reserved", false),                     // 27
    fatal("Hypervisor Injection Exception", false), // 28
    fatal("VMM Communication Exception", true),   // 29
    fatal("Security Exception", true),            // 30
    fatal("Reserved", false),                     // 31
];

/// Everything worth reporting about a CPU exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultReport {
    pub vector: u8,
    pub name: &'static str,
    /// The pushed fault code, for the vectors that define one.
    pub error_code: Option<u32>,
}

/// Outcome of one trip through the dispatch entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A hardware line (or stray vector) was serviced; carry on.
    Handled,
    /// A survivable exception; the caller may resume after reporting.
    Continuable(FaultReport),
    /// An irrecoverable exception; the caller must report and halt.
    Fatal(FaultReport),
}
