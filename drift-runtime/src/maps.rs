use anyhow::anyhow;
use drift_core::types::GeoPoint;
use drift_engine::traits::{Geocoder, PlacesProvider};
use drift_providers::google_maps::{
    GoogleMapsConfig, build_geocode_request, build_nearby_search_request,
};
use drift_providers::parse::{parse_geocode, parse_nearby_places};
use drift_providers::request::HttpRequest;
use drift_providers::runtime;

async fn fetch_json(req: &HttpRequest, what: &str) -> anyhow::Result<Vec<u8>> {
    let resp = runtime::execute(req).await?;
    if !resp.is_success() {
        return Err(anyhow!(
            "{what} request failed: status={} body={}",
            resp.status,
            resp.body_preview()
        ));
    }
    Ok(resp.body)
}

#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    maps: GoogleMapsConfig,
}

impl GoogleGeocoder {
    pub fn new(maps: GoogleMapsConfig) -> Self {
        Self { maps }
    }
}

#[async_trait::async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, query: &str) -> anyhow::Result<Option<GeoPoint>> {
        let body = fetch_json(&build_geocode_request(&self.maps, query), "geocoding").await?;
        let found = parse_geocode(&body)?;
        if let Some(addr) = &found {
            log::debug!(
                "geocoded {query} -> {} ({})",
                addr.point,
                addr.formatted_address.as_deref().unwrap_or("no address")
            );
        }
        Ok(found.map(|a| a.point))
    }
}

/// Points of interest around a city centre, used to seed the prompt.
#[derive(Debug, Clone)]
pub struct GooglePlacesProvider {
    maps: GoogleMapsConfig,
}

impl GooglePlacesProvider {
    pub fn new(maps: GoogleMapsConfig) -> Self {
        Self { maps }
    }
}

#[async_trait::async_trait]
impl PlacesProvider for GooglePlacesProvider {
    async fn nearby(&self, point: GeoPoint, radius_m: u32) -> anyhow::Result<Vec<String>> {
        let req = build_nearby_search_request(&self.maps, point, radius_m);
        let places = parse_nearby_places(&fetch_json(&req, "nearby search").await?)?;
        log::info!("{} places within {radius_m} m of {point}", places.len());
        Ok(places.into_iter().map(|p| p.name).collect())
    }
}
