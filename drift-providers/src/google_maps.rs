use crate::openai_compatible::join_url;
use crate::request::HttpRequest;
use drift_core::types::GeoPoint;
use url::form_urlencoded;

/// Static Maps rejects URLs longer than this.
pub const MAX_STATIC_MAP_URL_LEN: usize = 8192;

#[derive(Clone, PartialEq, Eq)]
pub struct GoogleMapsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for GoogleMapsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleMapsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreetViewParams {
    pub width: u32,
    pub height: u32,
    pub heading: f32,
    pub pitch: f32,
    pub fov: f32,
}

fn build_get(cfg: &GoogleMapsConfig, path: &str, params: &[(&str, String)]) -> HttpRequest {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .append_pair("key", &cfg.api_key)
        .finish();
    HttpRequest::get(format!("{}?{}", join_url(&cfg.base_url, path), query))
}

/// `location` is either `"lat,lon"` or a free-text address.
pub fn build_street_view_request(
    cfg: &GoogleMapsConfig,
    location: &str,
    params: &StreetViewParams,
) -> HttpRequest {
    build_get(
        cfg,
        "/streetview",
        &[
            ("size", format!("{}x{}", params.width, params.height)),
            ("location", location.to_string()),
            ("heading", format!("{:.1}", params.heading)),
            ("pitch", format!("{:.1}", params.pitch)),
            ("fov", format!("{:.1}", params.fov)),
            ("source", "outdoor".into()),
            // 404 instead of a grey "no imagery" tile.
            ("return_error_code", "true".into()),
        ],
    )
}

pub fn build_geocode_request(cfg: &GoogleMapsConfig, address: &str) -> HttpRequest {
    build_get(cfg, "/geocode/json", &[("address", address.to_string())])
}

pub fn build_nearby_search_request(
    cfg: &GoogleMapsConfig,
    point: GeoPoint,
    radius_m: u32,
) -> HttpRequest {
    build_get(
        cfg,
        "/place/nearbysearch/json",
        &[
            ("location", point.to_string()),
            ("radius", radius_m.to_string()),
            ("type", "point_of_interest".into()),
        ],
    )
}

pub fn build_walking_directions_request(
    cfg: &GoogleMapsConfig,
    origin: GeoPoint,
    destination: GeoPoint,
) -> HttpRequest {
    build_get(
        cfg,
        "/directions/json",
        &[
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
            ("mode", "walking".into()),
        ],
    )
}

/// Builds a route map request, thinning the path until the URL fits.
pub fn build_static_map_request(cfg: &GoogleMapsConfig, path: &[GeoPoint]) -> HttpRequest {
    let points = dedup_path(path);

    let mut req = static_map_with_path(cfg, &points);
    if req.url.len() > MAX_STATIC_MAP_URL_LEN {
        log::warn!(
            "route map URL too long ({} chars); simplifying {} path points",
            req.url.len(),
            points.len()
        );
        let mut step = points.len() / 100 + 1;
        loop {
            let thinned = thin_path(&points, step);
            req = static_map_with_path(cfg, &thinned);
            if req.url.len() <= MAX_STATIC_MAP_URL_LEN || thinned.len() <= 2 {
                break;
            }
            step += 1;
        }
    }
    req
}

fn static_map_with_path(cfg: &GoogleMapsConfig, points: &[GeoPoint]) -> HttpRequest {
    let mut params: Vec<(&str, String)> = vec![
        ("size", "1280x720".into()),
        ("scale", "2".into()),
        ("maptype", "roadmap".into()),
    ];
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        params.push(("markers", format!("color:green|label:S|{first}")));
        params.push(("markers", format!("color:red|label:E|{last}")));
    }
    if !points.is_empty() {
        let joined: Vec<String> = points.iter().map(GeoPoint::to_string).collect();
        params.push(("path", format!("color:0x0000ff|weight:5|{}", joined.join("|"))));
    }
    build_get(cfg, "/staticmap", &params)
}

/// Drops repeated points, keeping first-seen order.
pub fn dedup_path(path: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut seen: Vec<String> = Vec::with_capacity(path.len());
    let mut out = Vec::with_capacity(path.len());
    for p in path {
        let key = p.to_string();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(*p);
        }
    }
    out
}

/// Keeps every `step`-th point plus the final one so the route still ends in place.
pub fn thin_path(points: &[GeoPoint], step: usize) -> Vec<GeoPoint> {
    let step = step.max(1);
    let mut out: Vec<GeoPoint> = points.iter().step_by(step).copied().collect();
    if let Some(last) = points.last() {
        if out.last() != Some(last) {
            out.push(*last);
        }
    }
    out
}
