//! # PS/2 Keyboard Driver
//!
//! Turns the raw scan-code byte stream from hardware line 1 into discrete
//! key events.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   IRQ line 1   ┌──────────────────┐
//! │  Keyboard   │───────────────▶│ ScancodeDecoder  │
//! │  (port 60)  │  one byte/irq  │ - prefix state   │
//! └─────────────┘                │ - shift tracking │
//!                                │ - set 1/2 tables │
//!                                └────────┬─────────┘
//!                                         │ KeyEvent (presses only)
//!                                         ▼
//!                                ┌──────────────────┐
//!                                │    EventQueue    │──▶ poll loop
//!                                │  (SPSC ring)     │
//!                                └──────────────────┘
//! ```
//!
//! The decoder runs in interrupt context and only ever appends to the
//! queue; the main loop only ever removes. Each side touches its own index
//! with acquire/release ordering, so neither operation has an interruption
//! point in the middle on a single core.
//!
//! ## Decoding Rules
//!
//! Per incoming byte, in order:
//!
//! 1. `0xE0` marks an extended key; the prefix and the byte after it are
//!    swallowed whole.
//! 2. `0xF0` is the set-2 break prefix. Set-1 keyboards (the only kind the
//!    bring-up configures) never send it, but a byte following a stray
//!    `0xF0` is swallowed rather than misread as a press.
//! 3. Bit 7 set means release. Shift presses and releases update the shift
//!    flag and emit nothing; releases of every other key emit nothing.
//! 4. A genuine press maps through the table for the active scan-code set;
//!    set 1 resolves space, enter, and backspace ahead of its table. Only a
//!    non-zero mapping produces an event.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::devices::port::PortBus;

pub const KBD_DATA_PORT: u16 = 0x60;
pub const KBD_STATUS_PORT: u16 = 0x64;

/// Status bit 0: output buffer has a byte for us.
const STATUS_OUTPUT_FULL: u8 = 0x01;

/// Most stale bytes drained at reset before giving up.
const RESET_DRAIN_LIMIT: usize = 10;

const EXTENDED_PREFIX: u8 = 0xE0;
const BREAK_PREFIX: u8 = 0xF0;
const RELEASE_FLAG: u8 = 0x80;

/// One decoded keystroke. Only presses of mapped, non-modifier keys are
/// ever materialized; `pressed` records that fact explicitly all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Printable form, `'\0'` when the key has none.
    pub character: char,
    /// The raw scan code the event decoded from.
    pub scancode: u8,
    pub pressed: bool,
}

impl KeyEvent {
    const EMPTY: Self = Self {
        character: '\0',
        scancode: 0,
        pressed: false,
    };
}

/// Which raw encoding the keyboard speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanCodeSet {
    /// The encoding the controller bring-up selects; bit 7 flags releases.
    #[default]
    Set1,
    /// Kept for keyboards that cannot be switched; releases arrive as
    /// `0xF0`-prefixed pairs.
    Set2,
}

/// Byte-at-a-time scan-code state machine.
pub struct ScancodeDecoder {
    set: ScanCodeSet,
    pending_extended: bool,
    pending_break: bool,
    shift_held: bool,
}

impl ScancodeDecoder {
    pub const fn new(set: ScanCodeSet) -> Self {
        Self {
            set,
            pending_extended: false,
            pending_break: false,
            shift_held: false,
        }
    }

    /// Drop all prefix and modifier state, as on driver initialization.
    pub fn reset(&mut self) {
        self.pending_extended = false;
        self.pending_break = false;
        self.shift_held = false;
    }

    pub fn shift_held(&self) -> bool {
        self.shift_held
    }

    /// Feed one raw byte; returns the event it completes, if any.
    pub fn process(&mut self, scancode: u8) -> Option<KeyEvent> {
        if scancode == EXTENDED_PREFIX {
            self.pending_extended = true;
            return None;
        }
        if scancode == BREAK_PREFIX {
            self.pending_break = true;
            return None;
        }
        if self.pending_break {
            self.pending_break = false;
            return None;
        }
        if self.pending_extended {
            self.pending_extended = false;
            return None;
        }

        let released = scancode & RELEASE_FLAG != 0;
        let key_code = scancode & !RELEASE_FLAG;

        if self.is_shift_key(key_code) {
            self.shift_held = !released;
            return None;
        }
        if released {
            return None;
        }

        let character = match self.set {
            ScanCodeSet::Set1 => set1_to_char(key_code, self.shift_held),
            ScanCodeSet::Set2 => set2_to_char(key_code, self.shift_held),
        };
        (character != '\0').then_some(KeyEvent {
            character,
            scancode,
            pressed: true,
        })
    }

    fn is_shift_key(&self, key_code: u8) -> bool {
        match self.set {
            ScanCodeSet::Set1 => key_code == 0x2A || key_code == 0x36,
            ScanCodeSet::Set2 => key_code == 0x12 || key_code == 0x59,
        }
    }
}

// Set 1 tables, indexed directly by key code (0x00-0x39).
const SET1_UNSHIFTED: [u8; 0x3A] = [
    0, 0, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', // 0x00-0x09
    b'9', b'0', b'-', b'=', 0x08, b'\t', b'q', b'w', b'e', b'r', // 0x0A-0x13
    b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, // 0x14-0x1D
    b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', // 0x1E-0x25
    b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v', // 0x26-0x2F
    b'b', b'n', b'm', b',', b'.', b'/', 0, 0, b' ', 0, // 0x30-0x39
];

const SET1_SHIFTED: [u8; 0x3A] = [
    0, 0, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', // 0x00-0x09
    b'(', b')', b'_', b'+', 0x08, b'\t', b'Q', b'W', b'E', b'R', // 0x0A-0x13
    b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, // 0x14-0x1D
    b'A', b'S', b'D', b'F', b'G', b'H', b'J', b'K', // 0x1E-0x25
    b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V', // 0x26-0x2F
    b'B', b'N', b'M', b'<', b'>', b'?', 0, 0, b' ', 0, // 0x30-0x39
];

/// Set-1 key code to character. Space, enter, and backspace resolve before
/// the table; emulated controllers have been seen mangling exactly those.
fn set1_to_char(key_code: u8, shift: bool) -> char {
    match key_code {
        0x39 => return ' ',
        0x1C => return '\n',
        0x0E => return '\x08',
        _ => {}
    }
    let table = if shift { &SET1_SHIFTED } else { &SET1_UNSHIFTED };
    match table.get(key_code as usize) {
        Some(&byte) => byte as char,
        None => '\0',
    }
}

/// Set-2 key code to character.
fn set2_to_char(key_code: u8, shift: bool) -> char {
    let pair = |lower: char, upper: char| if shift { upper } else { lower };
    match key_code {
        // letters
        0x1C => pair('a', 'A'),
        0x32 => pair('b', 'B'),
        0x21 => pair('c', 'C'),
        0x23 => pair('d', 'D'),
        0x24 => pair('e', 'E'),
        0x2B => pair('f', 'F'),
        0x34 => pair('g', 'G'),
        0x33 => pair('h', 'H'),
        0x43 => pair('i', 'I'),
        0x3B => pair('j', 'J'),
        0x42 => pair('k', 'K'),
        0x4B => pair('l', 'L'),
        0x3A => pair('m', 'M'),
        0x31 => pair('n', 'N'),
        0x44 => pair('o', 'O'),
        0x4D => pair('p', 'P'),
        0x15 => pair('q', 'Q'),
        0x2D => pair('r', 'R'),
        0x1B => pair('s', 'S'),
        0x2C => pair('t', 'T'),
        0x3C => pair('u', 'U'),
        0x2A => pair('v', 'V'),
        0x1D => pair('w', 'W'),
        0x22 => pair('x', 'X'),
        0x35 => pair('y', 'Y'),
        0x1A => pair('z', 'Z'),
        // digit row
        0x16 => pair('1', '!'),
        0x1E => pair('2', '@'),
        0x26 => pair('3', '#'),
        0x25 => pair('4', '$'),
        0x2E => pair('5', '%'),
        0x36 => pair('6', '^'),
        0x3D => pair('7', '&'),
        0x3E => pair('8', '*'),
        0x46 => pair('9', '('),
        0x45 => pair('0', ')'),
        // punctuation
        0x4E => pair('-', '_'),
        0x55 => pair('=', '+'),
        0x41 => pair(',', '<'),
        0x49 => pair('.', '>'),
        0x4A => pair('/', '?'),
        0x4C => pair(';', ':'),
        0x52 => pair('\'', '"'),
        0x0E => pair('`', '~'),
        0x5D => pair('\\', '|'),
        0x54 => pair('[', '{'),
        0x5B => pair(']', '}'),
        // whitespace and editing
        0x29 => ' ',
        0x5A => '\n',
        0x66 => '\x08',
        0x0D => '\t',
        _ => '\0',
    }
}

/// Fixed-capacity single-producer/single-consumer event ring.
///
/// Interrupt context appends, the poll loop removes; head and tail are each
/// written by exactly one side. One slot is sacrificed to distinguish full
/// from empty, so the queue holds up to `CAP - 1` events. Overflow policy:
/// **drop-newest** — a push into a full ring discards the incoming event,
/// since the producer runs in interrupt context and has nobody to tell.
pub struct EventQueue<const CAP: usize = 64> {
    slots: UnsafeCell<[KeyEvent; CAP]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safety: single producer, single consumer; each index has one writer and
// the slot handoff is ordered by the release/acquire pair on that index.
unsafe impl<const CAP: usize> Sync for EventQueue<CAP> {}

impl<const CAP: usize> EventQueue<CAP> {
    pub const fn new() -> Self {
        Self {
            slots: UnsafeCell::new([KeyEvent::EMPTY; CAP]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Usable capacity.
    pub const fn capacity(&self) -> usize {
        CAP - 1
    }

    /// Append one event; returns `false` when the ring is full and the
    /// event was dropped.
    pub fn push(&self, event: KeyEvent) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = head.wrapping_add(1) % CAP;
        let tail = self.tail.load(Ordering::Acquire);
        if next == tail {
            return false;
        }
        unsafe {
            (*self.slots.get())[head] = event;
        }
        self.head.store(next, Ordering::Release);
        true
    }

    /// Remove the oldest event, if any.
    pub fn pop(&self) -> Option<KeyEvent> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let event = unsafe { (*self.slots.get())[tail] };
        self.tail.store(tail.wrapping_add(1) % CAP, Ordering::Release);
        Some(event)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }
}

impl<const CAP: usize> Default for EventQueue<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder plus queue, the unit the dispatch path and the poll loop share.
pub struct KeyboardDriver {
    decoder: ScancodeDecoder,
    queue: EventQueue,
}

impl KeyboardDriver {
    pub const fn new(set: ScanCodeSet) -> Self {
        Self {
            decoder: ScancodeDecoder::new(set),
            queue: EventQueue::new(),
        }
    }

    /// Interrupt-side entry: decode one byte, queue any completed event.
    pub fn handle_scancode(&mut self, scancode: u8) {
        if let Some(event) = self.decoder.process(scancode) {
            self.queue.push(event);
        }
    }

    /// Poll-side entry: at most one event per call, never blocks.
    pub fn poll_event(&self) -> Option<KeyEvent> {
        self.queue.pop()
    }

    /// Reinitialize: clear decoder state, drop queued events, and drain
    /// stale bytes (boot-time keystrokes) out of the controller.
    pub fn reset(&mut self, bus: &mut impl PortBus) {
        for _ in 0..RESET_DRAIN_LIMIT {
            if bus.read(KBD_STATUS_PORT) & STATUS_OUTPUT_FULL == 0 {
                break;
            }
            bus.read(KBD_DATA_PORT);
        }
        self.decoder.reset();
        while self.queue.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::port::SimBus;

    fn decoder() -> ScancodeDecoder {
        ScancodeDecoder::new(ScanCodeSet::Set1)
    }

    #[test]
    fn test_enter_press_release_yields_one_event() {
        let mut d = decoder();
        let event = d.process(0x1C).expect("press should decode");
        assert_eq!(event.character, '\n');
        assert_eq!(event.scancode, 0x1C);
        assert!(event.pressed);
        assert_eq!(d.process(0x9C), None);
    }

    #[test]
    fn test_space_and_backspace_overrides() {
        let mut d = decoder();
        assert_eq!(d.process(0x39).map(|e| e.character), Some(' '));
        assert_eq!(d.process(0x0E).map(|e| e.character), Some('\x08'));
    }

    #[test]
    fn test_shift_changes_mapping_and_emits_nothing() {
        let mut d = decoder();
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('a'));
        assert_eq!(d.process(0x2A), None); // left shift down
        assert!(d.shift_held());
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('A'));
        assert_eq!(d.process(0xAA), None); // left shift up
        assert!(!d.shift_held());
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('a'));
    }

    #[test]
    fn test_right_shift_tracked_too() {
        let mut d = decoder();
        d.process(0x36);
        assert_eq!(d.process(0x02).map(|e| e.character), Some('!'));
        d.process(0xB6);
        assert_eq!(d.process(0x02).map(|e| e.character), Some('1'));
    }

    #[test]
    fn test_extended_prefix_swallows_two_bytes() {
        let mut d = decoder();
        assert_eq!(d.process(0xE0), None);
        // 0x48 alone would be unmapped, but even a mapped code is swallowed
        assert_eq!(d.process(0x48), None);
        assert_eq!(d.process(0xE0), None);
        assert_eq!(d.process(0x1C), None); // keypad enter, not an event
        // stream is back in sync afterwards
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('a'));
    }

    #[test]
    fn test_break_prefix_swallows_following_byte() {
        let mut d = decoder();
        assert_eq!(d.process(0xF0), None);
        assert_eq!(d.process(0x1C), None);
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('a'));
    }

    #[test]
    fn test_ordinary_release_emits_nothing() {
        let mut d = decoder();
        assert_eq!(d.process(0x9E), None); // 'a' release without press
    }

    #[test]
    fn test_unmapped_code_emits_nothing() {
        let mut d = decoder();
        assert_eq!(d.process(0x3B), None); // F1
        assert_eq!(d.process(0x1D), None); // ctrl, unmapped here
    }

    #[test]
    fn test_set2_tables() {
        let mut d = ScancodeDecoder::new(ScanCodeSet::Set2);
        assert_eq!(d.process(0x1C).map(|e| e.character), Some('a'));
        assert_eq!(d.process(0x5A).map(|e| e.character), Some('\n'));
        d.process(0x12); // set-2 left shift
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('@'));
    }

    #[test]
    fn test_reset_clears_pending_state() {
        let mut d = decoder();
        d.process(0xE0);
        d.process(0x2A);
        d.reset();
        assert!(!d.shift_held());
        assert_eq!(d.process(0x1E).map(|e| e.character), Some('a'));
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue: EventQueue<8> = EventQueue::new();
        for scancode in [0x1E, 0x30, 0x2E] {
            queue.push(KeyEvent {
                character: 'x',
                scancode,
                pressed: true,
            });
        }
        assert_eq!(queue.pop().map(|e| e.scancode), Some(0x1E));
        assert_eq!(queue.pop().map(|e| e.scancode), Some(0x30));
        assert_eq!(queue.pop().map(|e| e.scancode), Some(0x2E));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_queue_drops_newest_on_overflow() {
        let queue: EventQueue<4> = EventQueue::new();
        let event = |scancode| KeyEvent {
            character: 'x',
            scancode,
            pressed: true,
        };
        assert!(queue.push(event(1)));
        assert!(queue.push(event(2)));
        assert!(queue.push(event(3)));
        assert_eq!(queue.capacity(), 3);
        // full: the incoming event is the one discarded
        assert!(!queue.push(event(4)));
        assert_eq!(queue.pop().map(|e| e.scancode), Some(1));
        assert_eq!(queue.pop().map(|e| e.scancode), Some(2));
        assert_eq!(queue.pop().map(|e| e.scancode), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_queue_wraps_around() {
        let queue: EventQueue<4> = EventQueue::new();
        let event = |scancode| KeyEvent {
            character: 'x',
            scancode,
            pressed: true,
        };
        for round in 0..10u8 {
            assert!(queue.push(event(round)));
            assert_eq!(queue.pop().map(|e| e.scancode), Some(round));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_driver_decodes_into_queue() {
        let mut driver = KeyboardDriver::new(ScanCodeSet::Set1);
        driver.handle_scancode(0x23); // 'h'
        driver.handle_scancode(0xA3);
        driver.handle_scancode(0x17); // 'i'
        assert_eq!(driver.poll_event().map(|e| e.character), Some('h'));
        assert_eq!(driver.poll_event().map(|e| e.character), Some('i'));
        assert_eq!(driver.poll_event(), None);
    }

    #[test]
    fn test_reset_drains_stale_controller_bytes() {
        let mut driver = KeyboardDriver::new(ScanCodeSet::Set1);
        driver.handle_scancode(0x1E);
        let mut bus = SimBus::new();
        // two stale bytes waiting, then the buffer reads empty
        bus.script_reads(KBD_STATUS_PORT, &[0x01, 0x01, 0x00]);
        bus.script_reads(KBD_DATA_PORT, &[0x1C, 0x9C]);
        driver.reset(&mut bus);
        // stale bytes were consumed from the data port
        assert_eq!(bus.read(KBD_DATA_PORT), 0x9C);
        // queued event from before the reset is gone
        assert_eq!(driver.poll_event(), None);
    }
}
