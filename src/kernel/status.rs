//! Component status tracking for the bring-up sequence.
//!
//! Each hardware component registers itself before initialization and
//! reports how it went; the embedding kernel can render the table as a boot
//! splash or dump it over serial after a failed boot. The registry is a
//! fixed-size table so it works before (and without) any allocator.

use core::fmt;
use spin::Mutex;

const MAX_COMPONENTS: usize = 8;

/// Where a component is in its bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(&'static str),
}

/// One registered component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

static INIT_STATUS: Mutex<[Option<ComponentStatus>; MAX_COMPONENTS]> =
    Mutex::new([None; MAX_COMPONENTS]);

/// Add a component to the registry. Silently ignored once the table is
/// full; eight slots is well past what the core registers.
pub fn register_component(name: &'static str) {
    let mut components = INIT_STATUS.lock();
    if let Some(slot) = components.iter_mut().find(|slot| slot.is_none()) {
        *slot = Some(ComponentStatus::new(name));
    }
}

/// Update a registered component's status.
pub fn update_component_status(name: &'static str, status: InitStatus) {
    let mut components = INIT_STATUS.lock();
    if let Some(component) = components
        .iter_mut()
        .flatten()
        .find(|component| component.name == name)
    {
        component.status = status;
    }
}

/// Snapshot of every registered component.
pub fn component_statuses() -> [Option<ComponentStatus>; MAX_COMPONENTS] {
    *INIT_STATUS.lock()
}

/// True once at least one component is registered and all are complete.
pub fn all_components_ready() -> bool {
    let components = INIT_STATUS.lock();
    let mut seen = false;
    for component in components.iter().flatten() {
        if !component.is_complete() {
            return false;
        }
        seen = true;
    }
    seen
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the registry is a process-wide static, so exercise it in one test
    #[test]
    fn test_register_update_and_query() {
        register_component("Interrupt Controllers");
        register_component("Interval Timer");
        assert!(!all_components_ready());

        update_component_status("Interrupt Controllers", InitStatus::Completed);
        assert!(!all_components_ready());

        update_component_status("Interval Timer", InitStatus::Failed("no response"));
        let statuses = component_statuses();
        let timer = statuses
            .iter()
            .flatten()
            .find(|c| c.name == "Interval Timer")
            .expect("registered");
        assert!(timer.is_failed());
        assert!(!all_components_ready());

        update_component_status("Interval Timer", InitStatus::Completed);
        assert!(all_components_ready());
    }
}
