use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drift_core::config::{AppConfig, SpeechSettings};
use drift_core::types::{GeoPoint, Montage, MontageFormat, WalkRequest};
use drift_engine::engine::{DriftEngine, EngineConfig, EngineError};
use drift_engine::session::WalkStage;
use drift_engine::traits::{
    Completion, Geocoder, ImageTarget, LlmProvider, MontageAssembler, NarrationClip,
    PlacesProvider, RouteMapper, SceneAsset, SpeechProvider, StreetImage, StreetViewProvider,
};
use drift_providers::openai_compatible::{
    ChatMessage, OpenAiCompatibleChatConfig, build_chat_completions_request,
};
use drift_providers::parse::parse_openai_chat_completion;
use drift_providers::runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SF_ROUTE: &str = "Start at Dolores Park, walk to Mission Dolores, end at Valencia Street";
const SF_CENTER: GeoPoint = GeoPoint {
    lat: 37.7749,
    lon: -122.4194,
};

struct OpenAiCompatibleLlm;

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleLlm {
    async fn complete(
        &self,
        base_url: &str,
        model: &str,
        temperature: f32,
        system_message: &str,
        user_message: &str,
    ) -> anyhow::Result<Completion> {
        let cfg = OpenAiCompatibleChatConfig {
            base_url: base_url.to_string(),
            api_key: "k".into(),
            model: model.to_string(),
            temperature,
        };
        let messages = vec![
            ChatMessage {
                role: "system".into(),
                content: system_message.to_string(),
            },
            ChatMessage {
                role: "user".into(),
                content: user_message.to_string(),
            },
        ];
        let req = build_chat_completions_request(&cfg, &messages);
        let resp = runtime::execute(&req).await?;
        if !resp.is_success() {
            return Err(anyhow::anyhow!("bad status {}", resp.status));
        }
        let text = parse_openai_chat_completion(&resp.body)?;
        Ok(Completion {
            text,
            provider: "openai-compatible".into(),
            model: model.into(),
        })
    }
}

/// Returns a tiny fake image for every target except the listed places.
struct ScriptedStreetView {
    missing: Vec<String>,
    calls: Arc<Mutex<Vec<(String, f32)>>>,
    delay_for_first: Option<Duration>,
}

impl ScriptedStreetView {
    fn new(missing: &[&str]) -> Self {
        Self {
            missing: missing.iter().map(|s| s.to_string()).collect(),
            calls: Arc::new(Mutex::new(vec![])),
            delay_for_first: None,
        }
    }
}

#[async_trait::async_trait]
impl StreetViewProvider for ScriptedStreetView {
    async fn fetch_image(
        &self,
        target: &ImageTarget,
        heading: f32,
    ) -> anyhow::Result<Option<StreetImage>> {
        let location = target.as_location();
        if let Some(delay) = self.delay_for_first {
            if location.starts_with("Dolores Park") {
                tokio::time::sleep(delay).await;
            }
        }
        self.calls.lock().unwrap().push((location.clone(), heading));
        if self.missing.iter().any(|m| location.starts_with(m.as_str())) {
            return Ok(None);
        }
        Ok(Some(StreetImage {
            heading,
            content_type: Some("image/jpeg".into()),
            bytes: location.into_bytes(),
        }))
    }
}

struct FailingSpeech;

#[async_trait::async_trait]
impl SpeechProvider for FailingSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _settings: &SpeechSettings,
    ) -> anyhow::Result<NarrationClip> {
        Err(anyhow::anyhow!("speech service unavailable"))
    }
}

struct RecordingSpeech {
    scripts: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl SpeechProvider for RecordingSpeech {
    async fn synthesize(
        &self,
        text: &str,
        settings: &SpeechSettings,
    ) -> anyhow::Result<NarrationClip> {
        self.scripts.lock().unwrap().push(text.to_string());
        Ok(NarrationClip {
            format: settings.format.clone(),
            duration_secs: Some(2.0),
            bytes: vec![0; 16],
        })
    }
}

#[derive(Default)]
struct RecordingAssembler {
    scenes: Arc<Mutex<Vec<SceneAsset>>>,
    fail: bool,
}

#[async_trait::async_trait]
impl MontageAssembler for RecordingAssembler {
    async fn assemble(
        &self,
        _title: &str,
        scenes: Vec<SceneAsset>,
        output: &Path,
    ) -> anyhow::Result<Montage> {
        if self.fail {
            return Err(anyhow::anyhow!("ffmpeg exploded"));
        }
        let frames = scenes.iter().map(|s| s.images.len()).sum();
        let has_audio = scenes.iter().any(|s| s.narration.is_some());
        let montage = Montage {
            path: output.to_path_buf(),
            format: MontageFormat::Frames,
            scenes: scenes.len(),
            frames,
            duration_secs: 0.0,
            has_audio,
        };
        *self.scenes.lock().unwrap() = scenes;
        Ok(montage)
    }
}

struct FixedGeocoder;

#[async_trait::async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, query: &str) -> anyhow::Result<Option<GeoPoint>> {
        Ok(match query {
            "Dolores Park, San Francisco" => Some(GeoPoint::new(37.7596, -122.4269)),
            "Mission Dolores, San Francisco" => Some(GeoPoint::new(37.7643, -122.4270)),
            "San Francisco" => Some(SF_CENTER),
            _ => None,
        })
    }
}

struct BrokenGeocoder;

#[async_trait::async_trait]
impl Geocoder for BrokenGeocoder {
    async fn geocode(&self, _query: &str) -> anyhow::Result<Option<GeoPoint>> {
        Err(anyhow::anyhow!("OVER_QUERY_LIMIT"))
    }
}

struct ScriptedPlaces {
    names: Option<Vec<String>>,
    calls: Arc<Mutex<Vec<(GeoPoint, u32)>>>,
}

impl ScriptedPlaces {
    fn new(names: Option<&[&str]>) -> Self {
        Self {
            names: names.map(|n| n.iter().map(|s| s.to_string()).collect()),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }
}

#[async_trait::async_trait]
impl PlacesProvider for ScriptedPlaces {
    async fn nearby(&self, point: GeoPoint, radius_m: u32) -> anyhow::Result<Vec<String>> {
        self.calls.lock().unwrap().push((point, radius_m));
        self.names
            .clone()
            .ok_or_else(|| anyhow::anyhow!("places quota exceeded"))
    }
}

struct CountingMapper {
    calls: Arc<Mutex<Vec<usize>>>,
}

#[async_trait::async_trait]
impl RouteMapper for CountingMapper {
    async fn render(&self, stops: &[GeoPoint]) -> anyhow::Result<Vec<u8>> {
        self.calls.lock().unwrap().push(stops.len());
        Ok(b"\x89PNG".to_vec())
    }
}

async fn mock_llm(body: &str) -> MockServer {
    let server = MockServer::start().await;
    let payload = serde_json::json!({"choices":[{"message":{"content": body}}]});
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer) -> EngineConfig {
    let mut cfg = AppConfig::default();
    cfg.llm.base_url = server.uri();
    cfg.imagery.headings_per_stop = 2;
    cfg.imagery.geocode_waypoints = false;
    EngineConfig::from(&cfg)
}

fn output() -> PathBuf {
    PathBuf::from("walk-out")
}

#[tokio::test]
async fn san_francisco_route_yields_three_ordered_waypoints() {
    let server = mock_llm(SF_ROUTE).await;
    let assembler = Arc::new(RecordingAssembler::default());
    let scenes = assembler.scenes.clone();

    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        assembler,
    );

    let res = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap();

    assert_eq!(res.stage, WalkStage::Done);
    assert_eq!(
        res.plan.names(),
        vec!["Dolores Park", "Mission Dolores", "Valencia Street"]
    );
    assert_eq!(res.counts.images_fetched, 6);
    assert_eq!(res.counts.images_missing, 0);

    let scenes = scenes.lock().unwrap();
    let order: Vec<&str> = scenes.iter().map(|s| s.waypoint.name.as_str()).collect();
    assert_eq!(order, vec!["Dolores Park", "Mission Dolores", "Valencia Street"]);
    assert_eq!(scenes[0].images[1].heading, 180.0);
}

#[tokio::test]
async fn missing_imagery_still_produces_montage_for_other_stops() {
    let server = mock_llm(SF_ROUTE).await;
    let assembler = Arc::new(RecordingAssembler::default());
    let scenes = assembler.scenes.clone();

    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&["Mission Dolores"])),
        assembler,
    );

    let res = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap();

    assert!(res.is_done());
    assert_eq!(res.counts.images_fetched, 4);
    assert_eq!(res.counts.images_missing, 2);
    let montage = res.montage.unwrap();
    assert_eq!(montage.scenes, 3);
    assert_eq!(montage.frames, 4);

    let scenes = scenes.lock().unwrap();
    assert!(scenes[1].images.is_empty());
    assert_eq!(scenes[1].missing_images, 2);
}

#[tokio::test]
async fn failing_speech_yields_image_only_montage() {
    let server = mock_llm(SF_ROUTE).await;
    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_speech(Arc::new(FailingSpeech));

    let res = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap();

    assert!(res.is_done());
    assert_eq!(res.counts.narrations_ok, 0);
    assert_eq!(res.counts.narrations_failed, 3);
    let montage = res.montage.unwrap();
    assert!(!montage.has_audio);
    assert_eq!(montage.frames, 6);
}

#[tokio::test]
async fn json_answer_intro_is_spoken_before_first_stop() {
    let answer = r#"{"title":"Fog","intro":"Let the fog lead.","stops":[
        {"name":"Dolores Park","narration":"Palms lean."},
        {"name":"Valencia Street","narration":"Murals hum."}]}"#;
    let server = mock_llm(answer).await;
    let scripts = Arc::new(Mutex::new(vec![]));

    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_speech(Arc::new(RecordingSpeech {
        scripts: scripts.clone(),
    }));

    let res = engine
        .run_walk(WalkRequest::new("San Francisco", 2), &output())
        .await
        .unwrap();

    assert_eq!(res.plan.title.as_deref(), Some("Fog"));
    assert_eq!(res.counts.narrations_ok, 2);
    assert!(res.montage.unwrap().has_audio);

    let scripts = scripts.lock().unwrap();
    assert_eq!(scripts[0], "Let the fog lead. Dolores Park. Palms lean.");
    assert_eq!(scripts[1], "Valencia Street. Murals hum.");
}

#[tokio::test]
async fn llm_failure_aborts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    );

    let err = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn empty_plan_aborts_with_typed_error() {
    let server = mock_llm("   ").await;
    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    );

    let err = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::EmptyPlan { .. })
    ));
}

#[tokio::test]
async fn assembly_failure_is_reported_on_the_result() {
    let server = mock_llm(SF_ROUTE).await;
    let engine = DriftEngine::new(
        config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler {
            fail: true,
            ..Default::default()
        }),
    );

    let res = engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap();

    assert_eq!(res.stage, WalkStage::Failed);
    assert_eq!(res.stage_label.as_deref(), Some("failed"));
    assert!(res.error.unwrap().contains("ffmpeg exploded"));
    assert_eq!(res.plan.len(), 3);
    assert!(res.montage.is_none());
}

#[tokio::test]
async fn stages_are_reported_in_order() {
    let server = mock_llm(SF_ROUTE).await;
    let mut cfg = config(&server);
    cfg.imagery.geocode_waypoints = true;
    let mapper_calls = Arc::new(Mutex::new(vec![]));

    let engine = DriftEngine::new(
        cfg,
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_speech(Arc::new(FailingSpeech))
    .with_geocoder(Arc::new(FixedGeocoder))
    .with_route_mapper(Arc::new(CountingMapper {
        calls: mapper_calls.clone(),
    }));

    let stages = Arc::new(Mutex::new(vec![]));
    let seen = stages.clone();
    let res = engine
        .run_walk_with_hook(WalkRequest::new("San Francisco", 3), &output(), move |s| {
            seen.lock().unwrap().push(s);
            async {}
        })
        .await
        .unwrap();

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            "prompting",
            "extracting",
            "resolving",
            "fetching_images",
            "narrating",
            "mapping",
            "assembling",
            "done"
        ]
    );
    // Valencia Street has no fixture coordinates; the map covers the two resolved stops.
    assert_eq!(*mapper_calls.lock().unwrap(), vec![2]);
    assert_eq!(res.plan.locations().len(), 2);
    assert!(res.route_map_png.is_some());
}

#[tokio::test]
async fn concurrent_fetching_preserves_stop_order() {
    let server = mock_llm(SF_ROUTE).await;
    let mut cfg = config(&server);
    cfg.fetch_concurrency = 3;

    let mut street_view = ScriptedStreetView::new(&[]);
    street_view.delay_for_first = Some(Duration::from_millis(50));
    let calls = street_view.calls.clone();
    let assembler = Arc::new(RecordingAssembler::default());
    let scenes = assembler.scenes.clone();

    let engine = DriftEngine::new(
        cfg,
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(street_view),
        assembler,
    );
    engine
        .run_walk(WalkRequest::new("San Francisco", 3), &output())
        .await
        .unwrap();

    // The slow first stop finished last...
    let calls = calls.lock().unwrap();
    assert!(calls.last().unwrap().0.starts_with("Dolores Park"));
    // ...but scenes still arrive in walking order.
    let scenes = scenes.lock().unwrap();
    let indices: Vec<usize> = scenes.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(scenes[0].waypoint.name, "Dolores Park");
}

fn nearby_config(server: &MockServer) -> EngineConfig {
    let mut cfg = AppConfig::default();
    cfg.llm.base_url = server.uri();
    cfg.imagery.headings_per_stop = 1;
    cfg.imagery.geocode_waypoints = false;
    cfg.imagery.nearby_inspiration = true;
    cfg.imagery.nearby_radius_m = 800;
    EngineConfig::from(&cfg)
}

async fn sent_user_message(server: &MockServer) -> String {
    let sent = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
    body["messages"][1]["content"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn nearby_places_are_offered_to_the_model() {
    let server = mock_llm(SF_ROUTE).await;
    let places = Arc::new(ScriptedPlaces::new(Some(&["Tartine Bakery", "Clarion Alley"])));
    let calls = places.calls.clone();

    let res = DriftEngine::new(
        nearby_config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_geocoder(Arc::new(FixedGeocoder))
    .with_places(places)
    .run_walk(WalkRequest::new("San Francisco", 3), &output())
    .await
    .unwrap();

    assert!(res.is_done());
    assert_eq!(*calls.lock().unwrap(), vec![(SF_CENTER, 800)]);

    let user = sent_user_message(&server).await;
    assert!(user.contains("<NEARBY_PLACES>\nTartine Bakery\nClarion Alley\n</NEARBY_PLACES>"));
    assert!(res.prompt.unwrap().user_message.contains("Clarion Alley"));
}

#[tokio::test]
async fn city_geocoding_failure_skips_nearby_places() {
    let server = mock_llm(SF_ROUTE).await;
    let places = Arc::new(ScriptedPlaces::new(Some(&["Tartine Bakery"])));
    let calls = places.calls.clone();

    let res = DriftEngine::new(
        nearby_config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_geocoder(Arc::new(BrokenGeocoder))
    .with_places(places)
    .run_walk(WalkRequest::new("San Francisco", 3), &output())
    .await
    .unwrap();

    assert!(res.is_done());
    assert_eq!(res.plan.len(), 3);
    assert!(calls.lock().unwrap().is_empty());
    assert!(!sent_user_message(&server).await.contains("<NEARBY_PLACES>"));
}

#[tokio::test]
async fn places_failure_still_runs_the_walk() {
    let server = mock_llm(SF_ROUTE).await;
    let places = Arc::new(ScriptedPlaces::new(None));
    let calls = places.calls.clone();

    let res = DriftEngine::new(
        nearby_config(&server),
        Arc::new(OpenAiCompatibleLlm),
        Arc::new(ScriptedStreetView::new(&[])),
        Arc::new(RecordingAssembler::default()),
    )
    .with_geocoder(Arc::new(FixedGeocoder))
    .with_places(places)
    .run_walk(WalkRequest::new("San Francisco", 3), &output())
    .await
    .unwrap();

    assert!(res.is_done());
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(res.counts.images_fetched, 3);
    assert!(!sent_user_message(&server).await.contains("<NEARBY_PLACES>"));
}
