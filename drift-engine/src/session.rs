use crate::traits::Completion;
use drift_core::prompt::BuiltPrompt;
use drift_core::types::{Montage, WalkPlan, WalkRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkStage {
    Prompting,
    Extracting,
    Resolving,
    FetchingImages,
    Narrating,
    Mapping,
    Assembling,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkTimings {
    pub completion_ms: Option<u64>,
    pub resolve_ms: Option<u64>,
    pub images_ms: Option<u64>,
    pub narration_ms: Option<u64>,
    pub assembly_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCounts {
    pub images_fetched: usize,
    pub images_missing: usize,
    pub narrations_ok: usize,
    pub narrations_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkResult {
    pub stage: WalkStage,
    // A stable string label for UI display.
    pub stage_label: Option<String>,
    pub request: WalkRequest,
    pub prompt: Option<BuiltPrompt>,
    pub completion: Option<Completion>,
    pub plan: WalkPlan,
    pub montage: Option<Montage>,
    #[serde(skip)]
    pub route_map_png: Option<Vec<u8>>,
    pub counts: AssetCounts,
    pub timings: WalkTimings,
    pub error: Option<String>,
}

impl WalkResult {
    pub fn started(request: WalkRequest) -> Self {
        Self {
            stage: WalkStage::Prompting,
            stage_label: Some("prompting".into()),
            request,
            prompt: None,
            completion: None,
            plan: WalkPlan::default(),
            montage: None,
            route_map_png: None,
            counts: AssetCounts::default(),
            timings: WalkTimings::default(),
            error: None,
        }
    }

    pub fn set_stage(&mut self, stage: WalkStage, label: &str) {
        self.stage = stage;
        self.stage_label = Some(label.into());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.set_stage(WalkStage::Failed, "failed");
        self.error = Some(error.into());
    }

    pub fn is_done(&self) -> bool {
        self.stage == WalkStage::Done
    }
}

pub fn ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}
