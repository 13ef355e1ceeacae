//! # CMOS Real-Time Clock
//!
//! Reads calendar time out of the battery-backed clock and normalizes it
//! into a local-time [`CalendarTime`].
//!
//! ## Read Protocol
//!
//! The chip updates its registers internally about once a second, and reads
//! that overlap an update see garbage. The protocol is therefore:
//!
//! 1. Wait (bounded) for the update-in-progress flag to clear.
//! 2. Read the format register: BCD vs binary, 12- vs 24-hour.
//! 3. Read all six calendar registers twice; a mismatch means an update
//!    slipped in between, so wait again and read a third time. If the third
//!    read still disagrees, the read fails rather than guessing.
//! 4. Convert from BCD, validate every field range, fold a 12-hour value to
//!    24-hour, and apply the local timezone offset with calendar rollover.
//!
//! Runs only from the poll loop; the bounded waits make it unsuitable for
//! interrupt context, and nothing here touches the dispatch path.
//!
//! Register selects keep bit 7 of the index byte set, which holds NMI
//! disabled for the duration of the access.

use core::fmt;

use crate::devices::port::PortBus;

pub const CMOS_INDEX_PORT: u16 = 0x70;
pub const CMOS_DATA_PORT: u16 = 0x71;

const REG_SECONDS: u8 = 0x00;
const REG_MINUTES: u8 = 0x02;
const REG_HOURS: u8 = 0x04;
const REG_DAY: u8 = 0x07;
const REG_MONTH: u8 = 0x08;
const REG_YEAR: u8 = 0x09;
const REG_STATUS_A: u8 = 0x0A;
const REG_STATUS_B: u8 = 0x0B;
const REG_CENTURY: u8 = 0x32;

/// Bit 7 of the index byte: keep NMI disabled while the register is open.
const NMI_DISABLE: u8 = 0x80;

/// Status A bit 7: update in progress.
const STATUS_A_UPDATE_IN_PROGRESS: u8 = 1 << 7;
/// Status B bit 1: hours run 0-23 rather than 1-12.
const STATUS_B_24_HOUR: u8 = 1 << 1;
/// Status B bit 2: registers hold plain binary rather than BCD.
const STATUS_B_BINARY: u8 = 1 << 2;

/// In 12-hour format, bit 7 of the hour register is the PM flag.
const HOUR_PM_FLAG: u8 = 0x80;

/// How many update-in-progress polls before declaring the chip stuck.
const UIP_RETRY_BUDGET: u32 = 100_000;

const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A normalized calendar reading. Produced fresh on every successful read,
/// never cached, never partially filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub second: u8,
    pub minute: u8,
    /// 0-23 after 12-hour folding and timezone adjustment.
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    /// Two-digit year.
    pub year: u8,
    /// 19 or 20 when the century register holds something credible, else 0.
    pub century: u8,
}

/// Why a clock read produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The update-in-progress flag never cleared within the retry budget.
    Timeout,
    /// Consecutive snapshots kept disagreeing even after the retry read.
    Inconsistent,
    /// A field fell outside its valid calendar range.
    InvalidRange,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::Timeout => write!(f, "clock update never settled"),
            ClockError::Inconsistent => write!(f, "clock registers kept changing mid-read"),
            ClockError::InvalidRange => write!(f, "clock returned an out-of-range field"),
        }
    }
}

/// The six raw calendar registers, as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawSnapshot {
    second: u8,
    minute: u8,
    hour: u8,
    day: u8,
    month: u8,
    year: u8,
}

/// The reader itself. The timezone offset is fixed at construction; the
/// clock chip keeps UTC and the kernel presents local time.
#[derive(Debug, Clone, Copy)]
pub struct CmosClock {
    timezone_offset_hours: u8,
}

impl CmosClock {
    pub const fn new(timezone_offset_hours: u8) -> Self {
        Self {
            timezone_offset_hours,
        }
    }

    /// One full protocol run. Either every field comes back converted,
    /// validated, and timezone-adjusted, or the read reports why not.
    pub fn read(&self, bus: &mut impl PortBus) -> Result<CalendarTime, ClockError> {
        wait_update_clear(bus)?;
        let status_b = read_register(bus, REG_STATUS_B);
        let binary = status_b & STATUS_B_BINARY != 0;
        let hours_24 = status_b & STATUS_B_24_HOUR != 0;

        let first = read_snapshot(bus);
        let second = read_snapshot(bus);
        let raw = if first == second {
            second
        } else {
            // an update landed between the two reads; settle and try once
            wait_update_clear(bus)?;
            let third = read_snapshot(bus);
            if third != second {
                return Err(ClockError::Inconsistent);
            }
            third
        };

        let century_raw = read_register(bus, REG_CENTURY);
        self.decode(raw, century_raw, binary, hours_24)
    }

    fn decode(
        &self,
        raw: RawSnapshot,
        century_raw: u8,
        binary: bool,
        hours_24: bool,
    ) -> Result<CalendarTime, ClockError> {
        let convert = |value: u8| if binary { value } else { bcd_to_binary(value) };

        let pm = !hours_24 && raw.hour & HOUR_PM_FLAG != 0;
        let hour_field = if hours_24 {
            raw.hour
        } else {
            raw.hour & !HOUR_PM_FLAG
        };

        let second = convert(raw.second);
        let minute = convert(raw.minute);
        let mut hour = convert(hour_field);
        let day = convert(raw.day);
        let month = convert(raw.month);
        let year = convert(raw.year);

        let hour_valid = if hours_24 {
            hour <= 23
        } else {
            (1..=12).contains(&hour)
        };
        if second > 59
            || minute > 59
            || !hour_valid
            || !(1..=31).contains(&day)
            || !(1..=12).contains(&month)
            || year > 99
        {
            return Err(ClockError::InvalidRange);
        }

        if !hours_24 {
            hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            if hour > 23 {
                return Err(ClockError::InvalidRange);
            }
        }

        let century = match convert(century_raw) {
            c @ (19 | 20) => c,
            _ => 0,
        };

        let (hour, day, month, year) =
            apply_timezone(self.timezone_offset_hours, hour, day, month, year);

        Ok(CalendarTime {
            second,
            minute,
            hour,
            day,
            month,
            year,
            century,
        })
    }
}

/// `(bcd >> 4) * 10 + (bcd & 0xF)`.
fn bcd_to_binary(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0xF)
}

/// Days in a month under the two-digit-year leap rule: any year divisible
/// by 4 gets a 29-day February. Correct within a single century only.
fn days_in_month(month: u8, year: u8) -> u8 {
    if month == 2 && year % 4 == 0 {
        29
    } else {
        DAYS_IN_MONTH[(month - 1) as usize]
    }
}

/// Add the timezone offset to the hour, rolling the calendar forward when
/// it crosses midnight. Month and two-digit year cascade; the year wraps at
/// 99 like the hardware register does.
fn apply_timezone(offset_hours: u8, hour: u8, day: u8, month: u8, year: u8) -> (u8, u8, u8, u8) {
    let mut hour = hour + offset_hours;
    let mut day = day;
    let mut month = month;
    let mut year = year;
    if hour >= 24 {
        hour -= 24;
        day += 1;
        if day > days_in_month(month, year) {
            day = 1;
            month += 1;
            if month > 12 {
                month = 1;
                year = (year + 1) % 100;
            }
        }
    }
    (hour, day, month, year)
}

fn select_register(bus: &mut impl PortBus, reg: u8) {
    bus.write(CMOS_INDEX_PORT, NMI_DISABLE | reg);
}

fn read_register(bus: &mut impl PortBus, reg: u8) -> u8 {
    select_register(bus, reg);
    bus.read(CMOS_DATA_PORT)
}

fn wait_update_clear(bus: &mut impl PortBus) -> Result<(), ClockError> {
    for _ in 0..UIP_RETRY_BUDGET {
        if read_register(bus, REG_STATUS_A) & STATUS_A_UPDATE_IN_PROGRESS == 0 {
            return Ok(());
        }
    }
    Err(ClockError::Timeout)
}

fn read_snapshot(bus: &mut impl PortBus) -> RawSnapshot {
    RawSnapshot {
        second: read_register(bus, REG_SECONDS),
        minute: read_register(bus, REG_MINUTES),
        hour: read_register(bus, REG_HOURS),
        day: read_register(bus, REG_DAY),
        month: read_register(bus, REG_MONTH),
        year: read_register(bus, REG_YEAR),
    }
}
