pub mod engine;
pub mod session;
pub mod traits;

pub use engine::{DriftEngine, EngineConfig, EngineError};
pub use session::{AssetCounts, WalkResult, WalkStage, WalkTimings};
