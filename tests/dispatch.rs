//! Integration tests for the interrupt path: bring-up, dispatch, keyboard
//! flow, and acknowledgment ordering, all against the simulated port bus.

use kernel_core::devices::port::SimBus;
use kernel_core::interrupts::pic::{
    Pics, PRIMARY_COMMAND, PRIMARY_DATA, SECONDARY_COMMAND, SECONDARY_DATA,
};
use kernel_core::{
    CoreConfig, Disposition, Idt, KernelCore, INTERRUPT_GATE_FLAGS, KERNEL_CODE_SELECTOR,
};

const KBD_DATA_PORT: u16 = 0x60;

fn booted_core() -> KernelCore<SimBus> {
    let mut core = KernelCore::new(SimBus::new(), CoreConfig::default());
    Pics::new().bring_up(core.bus_mut());
    core.bus_mut().writes.clear();
    core
}

/// Fire a keyboard interrupt carrying one scan-code byte.
fn press(core: &mut KernelCore<SimBus>, scancode: u8) {
    core.bus_mut().script_read(KBD_DATA_PORT, scancode);
    assert_eq!(core.handle_interrupt(33, 0), Disposition::Handled);
}

#[test]
fn test_vector_table_covers_exceptions_and_lines() {
    let mut idt = Idt::new();
    for vector in 0..48u8 {
        idt.install(
            vector,
            0x0020_0000 + u32::from(vector) * 0x10,
            KERNEL_CODE_SELECTOR,
            INTERRUPT_GATE_FLAGS,
        );
    }
    assert!(idt.fully_populated());
    for vector in 48..=255u8 {
        assert!(!idt.entry(vector).is_present());
    }
}

#[test]
fn test_bring_up_masks_leave_timer_and_keyboard() {
    let mut bus = SimBus::new();
    Pics::new().bring_up(&mut bus);
    // last data-port write per controller is the initial mask
    assert_eq!(bus.writes_to(PRIMARY_DATA).last(), Some(&0xFC));
    assert_eq!(bus.writes_to(SECONDARY_DATA).last(), Some(&0xFF));
}

#[test]
fn test_typing_flows_from_interrupts_to_poll_loop() {
    let mut core = booted_core();

    // "hi" followed by enter, with releases interleaved
    for byte in [0x23, 0xA3, 0x17, 0x97, 0x1C, 0x9C] {
        press(&mut core, byte);
    }

    let typed: Vec<char> = core::iter::from_fn(|| core.poll_event())
        .map(|event| event.character)
        .collect();
    assert_eq!(typed, ['h', 'i', '\n']);
    assert_eq!(core.poll_event(), None);
}

#[test]
fn test_shifted_typing_across_interrupts() {
    let mut core = booted_core();
    for byte in [0x2A, 0x23, 0xA3, 0xAA, 0x17] {
        press(&mut core, byte);
    }
    let typed: Vec<char> = core::iter::from_fn(|| core.poll_event())
        .map(|event| event.character)
        .collect();
    assert_eq!(typed, ['H', 'i']);
}

#[test]
fn test_every_keyboard_interrupt_acknowledges_primary() {
    let mut core = booted_core();
    for byte in [0x23, 0xA3] {
        press(&mut core, byte);
    }
    assert_eq!(core.bus().writes_to(PRIMARY_COMMAND), [0x20, 0x20]);
    assert_eq!(core.bus().writes_to(SECONDARY_COMMAND), []);
}

#[test]
fn test_secondary_line_acknowledgment_order() {
    let mut core = booted_core();
    assert_eq!(core.handle_interrupt(44, 0), Disposition::Handled);
    assert_eq!(
        core.bus().writes,
        [(SECONDARY_COMMAND, 0x20), (PRIMARY_COMMAND, 0x20)]
    );
}

#[test]
fn test_timer_ticks_accumulate_monotonically() {
    let mut core = booted_core();
    let mut last = core.ticks();
    for _ in 0..100 {
        core.handle_interrupt(32, 0);
        let now = core.ticks();
        assert_eq!(now, last + 1);
        last = now;
    }
}

#[test]
fn test_exception_outcomes_match_policy_table() {
    let mut core = booted_core();
    for vector in 0..32u8 {
        match core.handle_interrupt(vector, 0xBEEF) {
            Disposition::Continuable(report) => {
                assert_eq!(vector, 14, "only the page fault may continue");
                assert_eq!(report.error_code, Some(0xBEEF));
            }
            Disposition::Fatal(report) => {
                assert_eq!(report.vector, vector);
                assert!(!report.name.is_empty());
            }
            Disposition::Handled => panic!("vector {vector} treated as hardware line"),
        }
    }
    // exceptions never touch the controllers
    assert!(core.bus().writes.is_empty());
}
