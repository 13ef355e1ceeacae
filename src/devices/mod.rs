//! Device Subsystem
//!
//! Hardware device drivers and abstractions:
//! - `port`: the injectable I/O port capability all drivers go through
//! - `drivers`: PS/2 keyboard and CMOS real-time clock

pub mod drivers;
pub mod port;
