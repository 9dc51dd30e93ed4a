mod clock;

pub use clock::{ClockState, SessionClock};
