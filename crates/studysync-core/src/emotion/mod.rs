mod camera;
mod history;
mod label;
mod sampler;

pub use camera::{DirectoryCamera, Frame, FrameSource};
pub use history::{EmotionHistory, DEFAULT_HISTORY_LEN, MAX_HISTORY_LEN};
pub use label::{EmotionDisplay, EmotionLabel};
pub use sampler::{CaptureSkip, CaptureTicket, EmotionSample, EmotionSampler};
