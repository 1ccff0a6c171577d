pub mod assembler;
pub mod effects;
pub mod error;
pub mod ffmpeg;
pub mod timeline;
pub mod wav;

pub use assembler::MediaAssembler;
pub use error::MediaError;
pub use timeline::{FrameSource, SceneInput, Timeline, plan_timeline};
pub use wav::wav_duration_secs;
