use std::sync::Arc;

use drift_core::config::AppConfig;
use drift_engine::engine::{DriftEngine, EngineConfig};
use drift_media::MediaAssembler;
use drift_providers::google_maps::GoogleMapsConfig;

use crate::llm::OpenAiCompatibleLlmProvider;
use crate::maps::{GoogleGeocoder, GooglePlacesProvider};
use crate::route_map::GoogleRouteMapper;
use crate::secrets::{ApiKeys, load_dotenv};
use crate::speech::OpenAiSpeechProvider;
use crate::street_view::GoogleStreetViewProvider;

/// Wire every provider for `cfg`. The route mapper is only attached when
/// `route_map` is set; it costs one directions call per leg.
pub fn build_engine(cfg: &AppConfig, keys: &ApiKeys, route_map: bool) -> DriftEngine {
    let maps = GoogleMapsConfig {
        base_url: cfg.imagery.maps_base_url.clone(),
        api_key: keys.google_maps.clone(),
    };

    let mut engine = DriftEngine::new(
        EngineConfig::from(cfg),
        Arc::new(OpenAiCompatibleLlmProvider::new(keys.openai.clone())),
        Arc::new(GoogleStreetViewProvider::new(maps.clone(), cfg.imagery.clone())),
        Arc::new(MediaAssembler::new(cfg.montage.clone())),
    )
    .with_geocoder(Arc::new(GoogleGeocoder::new(maps.clone())))
    .with_places(Arc::new(GooglePlacesProvider::new(maps.clone())));

    if cfg.speech.enabled {
        engine = engine.with_speech(Arc::new(OpenAiSpeechProvider::new(keys.openai.clone())));
    }
    if route_map {
        engine = engine.with_route_mapper(Arc::new(GoogleRouteMapper::new(maps)));
    }
    engine
}

/// Same as `build_engine`, reading API keys from the environment (and `.env`).
pub fn build_engine_from_config(cfg: &AppConfig, route_map: bool) -> anyhow::Result<DriftEngine> {
    load_dotenv();
    let keys = ApiKeys::from_env()?;
    Ok(build_engine(cfg, &keys, route_map))
}
