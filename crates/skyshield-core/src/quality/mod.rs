pub mod config;
pub mod flags;
pub mod scorer;

pub use config::QualityConfig;
pub use flags::QualityFlag;
pub use scorer::{score_frame, severity, streak_contrast, FrameQuality};
