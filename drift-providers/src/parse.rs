use anyhow::{Context, anyhow};
use drift_core::types::GeoPoint;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

pub fn parse_openai_chat_completion(body: &[u8]) -> anyhow::Result<String> {
    let resp: OpenAiChatResponse = serde_json::from_slice(body).context("decode chat JSON")?;
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("no content in chat completion response"))?;
    Ok(content)
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for GeoPoint {
    fn from(v: LatLng) -> Self {
        GeoPoint::new(v.lat, v.lng)
    }
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    formatted_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub point: GeoPoint,
    pub formatted_address: Option<String>,
}

/// `Ok(None)` for `ZERO_RESULTS`; any other non-OK status is an error.
pub fn parse_geocode(body: &[u8]) -> anyhow::Result<Option<GeocodedAddress>> {
    let resp: GeocodeResponse = serde_json::from_slice(body).context("decode geocode JSON")?;
    match resp.status.as_str() {
        "OK" => Ok(resp.results.into_iter().next().map(|r| GeocodedAddress {
            point: r.geometry.location.into(),
            formatted_address: r.formatted_address,
        })),
        "ZERO_RESULTS" => Ok(None),
        other => Err(maps_status_error("geocoding", other, resp.error_message)),
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    place_id: String,
    name: String,
    geometry: Geometry,
    vicinity: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPlace {
    pub id: String,
    pub name: String,
    pub point: GeoPoint,
    pub address: String,
    pub types: Vec<String>,
}

pub fn parse_nearby_places(body: &[u8]) -> anyhow::Result<Vec<NearbyPlace>> {
    let resp: NearbyResponse = serde_json::from_slice(body).context("decode places JSON")?;
    match resp.status.as_str() {
        "OK" => Ok(resp
            .results
            .into_iter()
            .map(|r| NearbyPlace {
                id: r.place_id,
                name: r.name,
                point: r.geometry.location.into(),
                address: r
                    .vicinity
                    .unwrap_or_else(|| "Address not available".into()),
                types: r.types,
            })
            .collect()),
        "ZERO_RESULTS" => Ok(vec![]),
        other => Err(maps_status_error("nearby search", other, resp.error_message)),
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    steps: Vec<DirectionsStep>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsStep {
    start_location: LatLng,
    end_location: LatLng,
    distance: ValueField,
    duration: ValueField,
    #[serde(default)]
    html_instructions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub distance_m: f64,
    pub duration_s: f64,
    pub instructions: String,
}

pub fn parse_walking_directions(body: &[u8]) -> anyhow::Result<Vec<RouteStep>> {
    let resp: DirectionsResponse =
        serde_json::from_slice(body).context("decode directions JSON")?;
    match resp.status.as_str() {
        "OK" => {
            let steps = resp
                .routes
                .into_iter()
                .next()
                .and_then(|r| r.legs.into_iter().next())
                .map(|leg| leg.steps)
                .unwrap_or_default();
            Ok(steps
                .into_iter()
                .map(|s| RouteStep {
                    start: s.start_location.into(),
                    end: s.end_location.into(),
                    distance_m: s.distance.value,
                    duration_s: s.duration.value,
                    instructions: s.html_instructions,
                })
                .collect())
        }
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(vec![]),
        other => Err(maps_status_error("directions", other, resp.error_message)),
    }
}

fn maps_status_error(what: &str, status: &str, message: Option<String>) -> anyhow::Error {
    match message {
        Some(m) => anyhow!("{what} failed: {status} ({m})"),
        None => anyhow!("{what} failed: {status}"),
    }
}
