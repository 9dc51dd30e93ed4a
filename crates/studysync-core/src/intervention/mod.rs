mod gate;
mod style;

pub use gate::{
    GateDecision, InterventionGate, InterventionKind, InterventionPayload, InterventionRequest,
    InterventionState, Resolution, SuppressReason, DEFAULT_COOLDOWN_SECS,
};
pub use style::InterventionStyle;
