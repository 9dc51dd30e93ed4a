mod alert;
mod monitor;

pub use alert::{AlertSound, Silent, TerminalBell};
pub use monitor::{
    FocusEvent, FocusKind, FocusMonitor, Visibility, DEFAULT_BANNER_SECS,
    DEFAULT_PENALTY_PER_SWITCH,
};
