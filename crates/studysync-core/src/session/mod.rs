mod controller;
mod runner;

pub use controller::{RemediationRequest, SessionController, SessionSettings, SessionSnapshot};
pub use runner::{SessionCommand, SessionRunner};
