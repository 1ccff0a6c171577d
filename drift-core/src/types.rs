use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex chars, used for default output names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkRequest {
    pub city: String,
    pub theme: Option<String>,
    pub stops: usize,
}

impl WalkRequest {
    pub fn new(city: impl Into<String>, stops: usize) -> Self {
        Self {
            city: city.into(),
            theme: None,
            stops: stops.max(1),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        let theme = theme.into();
        self.theme = (!theme.trim().is_empty()).then_some(theme);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub narration: Option<String>,
    pub location: Option<GeoPoint>,
}

impl Waypoint {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            narration: None,
            location: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        let narration = narration.into();
        self.narration = (!narration.trim().is_empty()).then(|| narration.trim().to_string());
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Text handed to speech synthesis for this stop.
    pub fn narration_script(&self) -> String {
        match self.narration.as_deref() {
            Some(n) => format!("{}. {}", self.name.trim_end_matches('.'), n),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalkPlan {
    pub title: Option<String>,
    pub intro: Option<String>,
    pub waypoints: Vec<Waypoint>,
}

impl WalkPlan {
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.waypoints.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn locations(&self) -> Vec<GeoPoint> {
        self.waypoints.iter().filter_map(|w| w.location).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MontageFormat {
    #[default]
    Video,
    Frames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Montage {
    pub path: PathBuf,
    pub format: MontageFormat,
    pub scenes: usize,
    pub frames: usize,
    pub duration_secs: f64,
    pub has_audio: bool,
}
