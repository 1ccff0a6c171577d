use anyhow::anyhow;
use drift_core::types::GeoPoint;
use drift_engine::traits::RouteMapper;
use drift_providers::google_maps::{
    GoogleMapsConfig, build_static_map_request, build_walking_directions_request,
};
use drift_providers::parse::parse_walking_directions;
use drift_providers::runtime;

/// Static map of the walk, following walking directions between stops.
#[derive(Debug, Clone)]
pub struct GoogleRouteMapper {
    maps: GoogleMapsConfig,
}

impl GoogleRouteMapper {
    pub fn new(maps: GoogleMapsConfig) -> Self {
        Self { maps }
    }

    /// Street-level path through `stops`. A leg without directions is drawn
    /// as a straight line.
    pub async fn walking_path(&self, stops: &[GeoPoint]) -> Vec<GeoPoint> {
        let mut path: Vec<GeoPoint> = stops.first().copied().into_iter().collect();
        for leg in stops.windows(2) {
            let (from, to) = (leg[0], leg[1]);
            match self.leg(from, to).await {
                Ok(points) if !points.is_empty() => path.extend(points),
                Ok(_) => {
                    log::info!("no walking route {from} -> {to}; drawing a straight line");
                    path.push(to);
                }
                Err(e) => {
                    log::warn!("walking directions {from} -> {to} failed: {e:#}");
                    path.push(to);
                }
            }
        }
        path
    }

    async fn leg(&self, from: GeoPoint, to: GeoPoint) -> anyhow::Result<Vec<GeoPoint>> {
        let req = build_walking_directions_request(&self.maps, from, to);
        let resp = runtime::execute(&req).await?;
        if !resp.is_success() {
            return Err(anyhow!("directions status={}", resp.status));
        }
        let steps = parse_walking_directions(&resp.body)?;
        let mut points = Vec::with_capacity(steps.len() + 1);
        if let Some(first) = steps.first() {
            points.push(first.start);
        }
        points.extend(steps.iter().map(|s| s.end));
        Ok(points)
    }
}

#[async_trait::async_trait]
impl RouteMapper for GoogleRouteMapper {
    async fn render(&self, stops: &[GeoPoint]) -> anyhow::Result<Vec<u8>> {
        let path = self.walking_path(stops).await;
        let resp = runtime::execute(&build_static_map_request(&self.maps, &path)).await?;
        if !resp.is_success() {
            return Err(anyhow!(
                "static map request failed: status={} body={}",
                resp.status,
                resp.body_preview()
            ));
        }
        match resp.content_type.as_deref() {
            Some(ct) if !ct.starts_with("image/") => {
                Err(anyhow!("static map returned {ct}: {}", resp.body_preview()))
            }
            _ => Ok(resp.body),
        }
    }
}
