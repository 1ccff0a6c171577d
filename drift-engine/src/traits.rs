use async_trait::async_trait;
use drift_core::config::SpeechSettings;
use drift_core::types::{GeoPoint, Montage, Waypoint};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub provider: String,
    pub model: String,
}

/// What a street-view lookup is keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageTarget {
    Point(GeoPoint),
    Place(String),
}

impl ImageTarget {
    pub fn for_waypoint(waypoint: &Waypoint, city: &str) -> Self {
        match waypoint.location {
            Some(point) => ImageTarget::Point(point),
            None => ImageTarget::Place(place_query(&waypoint.name, city)),
        }
    }

    pub fn as_location(&self) -> String {
        match self {
            ImageTarget::Point(p) => p.to_string(),
            ImageTarget::Place(s) => s.clone(),
        }
    }
}

/// "{name}, {city}" unless the name already mentions the city.
pub fn place_query(name: &str, city: &str) -> String {
    let city = city.trim();
    if city.is_empty() || name.to_lowercase().contains(&city.to_lowercase()) {
        name.trim().to_string()
    } else {
        format!("{}, {}", name.trim(), city)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetImage {
    pub heading: f32,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for StreetImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreetImage")
            .field("heading", &self.heading)
            .field("content_type", &self.content_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationClip {
    // File extension / response format, e.g. "wav".
    pub format: String,
    pub duration_secs: Option<f64>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for NarrationClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationClip")
            .field("format", &self.format)
            .field("duration_secs", &self.duration_secs)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// One stop's gathered media, filled in as the fetchers succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAsset {
    pub index: usize,
    pub waypoint: Waypoint,
    pub images: Vec<StreetImage>,
    pub missing_images: usize,
    pub narration: Option<NarrationClip>,
}

impl SceneAsset {
    pub fn new(index: usize, waypoint: Waypoint) -> Self {
        Self {
            index,
            waypoint,
            images: vec![],
            missing_images: 0,
            narration: None,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        base_url: &str,
        model: &str,
        temperature: f32,
        system_message: &str,
        user_message: &str,
    ) -> anyhow::Result<Completion>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> anyhow::Result<Option<GeoPoint>>;
}

#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Names of points of interest around `point`.
    async fn nearby(&self, point: GeoPoint, radius_m: u32) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait StreetViewProvider: Send + Sync {
    /// `Ok(None)` means the imagery service has nothing for this target.
    async fn fetch_image(
        &self,
        target: &ImageTarget,
        heading: f32,
    ) -> anyhow::Result<Option<StreetImage>>;
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        settings: &SpeechSettings,
    ) -> anyhow::Result<NarrationClip>;
}

#[async_trait]
pub trait RouteMapper: Send + Sync {
    /// PNG of the walking route through `stops`.
    async fn render(&self, stops: &[GeoPoint]) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait MontageAssembler: Send + Sync {
    async fn assemble(
        &self,
        title: &str,
        scenes: Vec<SceneAsset>,
        output: &Path,
    ) -> anyhow::Result<Montage>;
}
