//! # Programmable Interval Timer (8253/8254 channel 0)
//!
//! Programs the periodic interrupt source behind hardware line 0. The chip
//! divides its fixed 1,193,182 Hz input clock by a 16-bit divisor; every
//! time the countdown hits zero it raises line 0 and reloads, which is what
//! drives the kernel's tick counter.
//!
//! The three-byte program (command, divisor low, divisor high) must not be
//! torn by an interrupt in the middle, so the hardware-facing wrapper runs
//! it with interrupts suspended and restores the previous interrupt-enable
//! state afterward. The chip offers no readback; the write sequence is the
//! whole contract.

use crate::devices::port::PortBus;

/// Input clock of channel 0, in Hz.
pub const PIT_BASE_FREQUENCY_HZ: u32 = 1_193_182;

/// Lowest programmable rate: the 16-bit divisor tops out near 18.2 Hz.
pub const PIT_MIN_FREQUENCY_HZ: u32 = 19;

pub const CHANNEL_0_DATA: u16 = 0x40;
pub const MODE_COMMAND: u16 = 0x43;

/// Channel 0, low-then-high byte access, periodic square wave.
const SQUARE_WAVE_CHANNEL_0: u8 = 0x36;

pub struct Pit;

impl Pit {
    /// Divisor for a requested rate, clamped to the programmable range.
    /// Integer division truncates, exactly as the achieved rate does.
    pub fn divisor_for(frequency_hz: u32) -> u16 {
        let frequency_hz = frequency_hz.clamp(PIT_MIN_FREQUENCY_HZ, PIT_BASE_FREQUENCY_HZ);
        (PIT_BASE_FREQUENCY_HZ / frequency_hz) as u16
    }

    /// The raw three-byte program. Callers must guarantee the sequence is
    /// not interleaved with other timer traffic; on hardware that means
    /// running under [`Pit::configure`].
    pub fn program(bus: &mut impl PortBus, frequency_hz: u32) {
        let divisor = Self::divisor_for(frequency_hz);
        bus.write(MODE_COMMAND, SQUARE_WAVE_CHANNEL_0);
        bus.write(CHANNEL_0_DATA, (divisor & 0xFF) as u8);
        bus.write(CHANNEL_0_DATA, (divisor >> 8) as u8);
    }

    /// Program the timer with interrupts suspended for the duration of the
    /// sequence. The previous interrupt-enable state is restored on return.
    pub fn configure(bus: &mut impl PortBus, frequency_hz: u32) {
        x86_64::instructions::interrupts::without_interrupts(|| {
            Self::program(bus, frequency_hz);
        });
    }
}
