use crate::types::MontageFormat;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAPS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub voice: String,
    // wav keeps clip durations readable without ffprobe.
    pub format: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_LLM_BASE_URL.into(),
            model: "tts-1".into(),
            voice: "onyx".into(),
            format: "wav".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagerySettings {
    pub maps_base_url: String,
    pub width: u32,
    pub height: u32,
    pub pitch: f32,
    pub fov: f32,
    pub headings_per_stop: u32,
    pub geocode_waypoints: bool,
    pub nearby_inspiration: bool,
    pub nearby_radius_m: u32,
}

impl Default for ImagerySettings {
    fn default() -> Self {
        Self {
            maps_base_url: DEFAULT_MAPS_BASE_URL.into(),
            // Street View Static caps standard requests at 640px per side.
            width: 640,
            height: 360,
            pitch: 0.0,
            fov: 90.0,
            headings_per_stop: 4,
            geocode_waypoints: true,
            nearby_inspiration: false,
            nearby_radius_m: 500,
        }
    }
}

impl ImagerySettings {
    /// Evenly spread compass headings for one stop.
    pub fn headings(&self) -> Vec<f32> {
        let n = self.headings_per_stop.max(1);
        (0..n).map(|i| 360.0 / n as f32 * i as f32).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingImagePolicy {
    #[default]
    RepeatPrevious,
    Placeholder,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEffect {
    #[default]
    None,
    Psychedelic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MontageSettings {
    pub format: MontageFormat,
    pub fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub seconds_per_image: f64,
    pub min_scene_secs: f64,
    pub missing_image: MissingImagePolicy,
    pub effect: FrameEffect,
}

impl Default for MontageSettings {
    fn default() -> Self {
        Self {
            format: MontageFormat::Video,
            fps: 30,
            frame_width: 1280,
            frame_height: 720,
            seconds_per_image: 1.5,
            min_scene_secs: 3.0,
            missing_image: MissingImagePolicy::RepeatPrevious,
            effect: FrameEffect::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub speech: SpeechSettings,
    pub imagery: ImagerySettings,
    pub montage: MontageSettings,
    pub fetch_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            speech: SpeechSettings::default(),
            imagery: ImagerySettings::default(),
            montage: MontageSettings::default(),
            fetch_concurrency: 1,
        }
    }
}
