use crate::session::{WalkResult, WalkStage, ms};
use crate::traits::{
    Geocoder, ImageTarget, LlmProvider, MontageAssembler, PlacesProvider, RouteMapper,
    SceneAsset, SpeechProvider, StreetViewProvider, place_query,
};
use drift_core::config::{AppConfig, ImagerySettings, LlmSettings, SpeechSettings};
use drift_core::prompt::{build_walk_prompt, post_process_llm_output};
use drift_core::route::extract_walk_plan;
use drift_core::types::{WalkPlan, WalkRequest, Waypoint};
use futures_util::{StreamExt, stream};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const STAGE_PROMPTING: &str = "prompting";
const STAGE_EXTRACTING: &str = "extracting";
const STAGE_RESOLVING: &str = "resolving";
const STAGE_FETCHING_IMAGES: &str = "fetching_images";
const STAGE_NARRATING: &str = "narrating";
const STAGE_MAPPING: &str = "mapping";
const STAGE_ASSEMBLING: &str = "assembling";
const STAGE_DONE: &str = "done";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("walk request has no city")]
    EmptyCity,
    #[error("the model's answer contained no recognizable stops for {city}")]
    EmptyPlan { city: String },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub llm: LlmSettings,
    pub speech: SpeechSettings,
    pub imagery: ImagerySettings,
    pub fetch_concurrency: usize,
}

impl From<&AppConfig> for EngineConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            llm: cfg.llm.clone(),
            speech: cfg.speech.clone(),
            imagery: cfg.imagery.clone(),
            fetch_concurrency: cfg.fetch_concurrency,
        }
    }
}

pub struct DriftEngine {
    cfg: EngineConfig,
    llm: Arc<dyn LlmProvider>,
    street_view: Arc<dyn StreetViewProvider>,
    assembler: Arc<dyn MontageAssembler>,
    speech: Option<Arc<dyn SpeechProvider>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    places: Option<Arc<dyn PlacesProvider>>,
    route_mapper: Option<Arc<dyn RouteMapper>>,
}

impl DriftEngine {
    pub fn new(
        cfg: EngineConfig,
        llm: Arc<dyn LlmProvider>,
        street_view: Arc<dyn StreetViewProvider>,
        assembler: Arc<dyn MontageAssembler>,
    ) -> Self {
        Self {
            cfg,
            llm,
            street_view,
            assembler,
            speech: None,
            geocoder: None,
            places: None,
            route_mapper: None,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechProvider>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_places(mut self, places: Arc<dyn PlacesProvider>) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_route_mapper(mut self, mapper: Arc<dyn RouteMapper>) -> Self {
        self.route_mapper = Some(mapper);
        self
    }

    /// Runs the full pipeline (prompt -> extract -> fetch -> narrate -> assemble).
    pub async fn run_walk(&self, request: WalkRequest, output: &Path) -> anyhow::Result<WalkResult> {
        self.run_walk_with_hook(request, output, |_stage| async {})
            .await
    }

    /// Same as `run_walk`, but emits a stage hook as the pipeline progresses.
    ///
    /// Completion failures and empty plans abort with `Err`. Geocoding, imagery,
    /// speech and route-map failures are logged and skipped. An assembly failure
    /// is reported on the returned result with stage `Failed`, so the plan and
    /// counters stay inspectable.
    pub async fn run_walk_with_hook<F, Fut>(
        &self,
        request: WalkRequest,
        output: &Path,
        on_stage: F,
    ) -> anyhow::Result<WalkResult>
    where
        F: Fn(&'static str) -> Fut,
        Fut: Future<Output = ()>,
    {
        if request.city.trim().is_empty() {
            return Err(EngineError::EmptyCity.into());
        }

        let mut result = WalkResult::started(request.clone());

        // 1) Prompt + completion
        result.set_stage(WalkStage::Prompting, STAGE_PROMPTING);
        on_stage(STAGE_PROMPTING).await;

        let nearby = self.nearby_inspiration(&request.city).await;
        let prompt = build_walk_prompt(&request, nearby.as_deref());

        let t0 = Instant::now();
        let completion = self
            .llm
            .complete(
                &self.cfg.llm.base_url,
                &self.cfg.llm.model,
                self.cfg.llm.temperature,
                &prompt.system_message,
                &prompt.user_message,
            )
            .await?;
        result.timings.completion_ms = Some(ms(t0.elapsed()));
        result.prompt = Some(prompt);

        // 2) Extract
        result.set_stage(WalkStage::Extracting, STAGE_EXTRACTING);
        on_stage(STAGE_EXTRACTING).await;

        let mut plan = extract_walk_plan(&post_process_llm_output(&completion.text));
        result.completion = Some(completion);
        if plan.is_empty() {
            return Err(EngineError::EmptyPlan {
                city: request.city.clone(),
            }
            .into());
        }
        if plan.len() != request.stops {
            log::warn!(
                "asked for {} stops, model returned {}",
                request.stops,
                plan.len()
            );
        }
        log::info!("walk plan: {}", plan.names().join(" -> "));

        // 3) Resolve coordinates
        if self.cfg.imagery.geocode_waypoints {
            if let Some(geocoder) = &self.geocoder {
                result.set_stage(WalkStage::Resolving, STAGE_RESOLVING);
                on_stage(STAGE_RESOLVING).await;

                let r0 = Instant::now();
                resolve_locations(geocoder.as_ref(), &mut plan, &request.city).await;
                result.timings.resolve_ms = Some(ms(r0.elapsed()));
            }
        }
        result.plan = plan.clone();

        // 4) Street-view imagery
        result.set_stage(WalkStage::FetchingImages, STAGE_FETCHING_IMAGES);
        on_stage(STAGE_FETCHING_IMAGES).await;

        let i0 = Instant::now();
        let concurrency = self.cfg.fetch_concurrency.max(1);
        let headings = self.cfg.imagery.headings();
        let mut scenes: Vec<SceneAsset> = stream::iter(plan.waypoints.iter().cloned().enumerate())
            .map(|(index, waypoint)| self.gather_images(index, waypoint, &request.city, &headings))
            .buffered(concurrency)
            .collect()
            .await;
        result.timings.images_ms = Some(ms(i0.elapsed()));
        result.counts.images_fetched = scenes.iter().map(|s| s.images.len()).sum();
        result.counts.images_missing = scenes.iter().map(|s| s.missing_images).sum();

        // 5) Narration
        if let Some(speech) = self.speech.as_ref().filter(|_| self.cfg.speech.enabled) {
            result.set_stage(WalkStage::Narrating, STAGE_NARRATING);
            on_stage(STAGE_NARRATING).await;

            let n0 = Instant::now();
            let attempted = scenes.len();
            scenes = stream::iter(scenes)
                .map(|scene| self.narrate(speech.as_ref(), scene, plan.intro.as_deref()))
                .buffered(concurrency)
                .collect()
                .await;
            result.timings.narration_ms = Some(ms(n0.elapsed()));
            result.counts.narrations_ok = scenes.iter().filter(|s| s.narration.is_some()).count();
            result.counts.narrations_failed = attempted - result.counts.narrations_ok;
        }

        // 6) Route map
        if let Some(mapper) = &self.route_mapper {
            let stops = plan.locations();
            if stops.len() >= 2 {
                result.set_stage(WalkStage::Mapping, STAGE_MAPPING);
                on_stage(STAGE_MAPPING).await;

                match mapper.render(&stops).await {
                    Ok(png) => result.route_map_png = Some(png),
                    Err(e) => log::warn!("route map failed: {e:#}"),
                }
            }
        }

        // 7) Assemble
        result.set_stage(WalkStage::Assembling, STAGE_ASSEMBLING);
        on_stage(STAGE_ASSEMBLING).await;

        let title = walk_title(&plan, &request);
        let a0 = Instant::now();
        match self.assembler.assemble(&title, scenes, output).await {
            Ok(montage) => {
                result.timings.assembly_ms = Some(ms(a0.elapsed()));
                result.montage = Some(montage);
            }
            Err(e) => {
                log::error!("montage assembly failed: {e:#}");
                result.timings.assembly_ms = Some(ms(a0.elapsed()));
                result.fail(format!("{e:#}"));
                return Ok(result);
            }
        }

        result.set_stage(WalkStage::Done, STAGE_DONE);
        on_stage(STAGE_DONE).await;
        Ok(result)
    }

    async fn nearby_inspiration(&self, city: &str) -> Option<Vec<String>> {
        if !self.cfg.imagery.nearby_inspiration {
            return None;
        }
        let (geocoder, places) = (self.geocoder.as_ref()?, self.places.as_ref()?);

        let center = match geocoder.geocode(city).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                log::warn!("could not geocode {city}; skipping nearby places");
                return None;
            }
            Err(e) => {
                log::warn!("geocoding {city} failed: {e:#}");
                return None;
            }
        };

        match places.nearby(center, self.cfg.imagery.nearby_radius_m).await {
            Ok(names) if !names.is_empty() => Some(names),
            Ok(_) => None,
            Err(e) => {
                log::warn!("nearby places lookup failed: {e:#}");
                None
            }
        }
    }

    async fn gather_images(
        &self,
        index: usize,
        waypoint: Waypoint,
        city: &str,
        headings: &[f32],
    ) -> SceneAsset {
        let target = ImageTarget::for_waypoint(&waypoint, city);
        let mut scene = SceneAsset::new(index, waypoint);

        for &heading in headings {
            match self.street_view.fetch_image(&target, heading).await {
                Ok(Some(image)) => scene.images.push(image),
                Ok(None) => {
                    log::info!(
                        "no street view imagery for {} at heading {heading}",
                        scene.waypoint.name
                    );
                    scene.missing_images += 1;
                }
                Err(e) => {
                    log::warn!(
                        "street view fetch failed for {} at heading {heading}: {e:#}",
                        scene.waypoint.name
                    );
                    scene.missing_images += 1;
                }
            }
        }
        scene
    }

    async fn narrate(
        &self,
        speech: &dyn SpeechProvider,
        mut scene: SceneAsset,
        intro: Option<&str>,
    ) -> SceneAsset {
        let mut script = scene.waypoint.narration_script();
        if scene.index == 0 {
            if let Some(intro) = intro.filter(|s| !s.trim().is_empty()) {
                script = format!("{} {}", intro.trim(), script);
            }
        }

        match speech.synthesize(&script, &self.cfg.speech).await {
            Ok(clip) => scene.narration = Some(clip),
            Err(e) => log::warn!("narration failed for {}: {e:#}", scene.waypoint.name),
        }
        scene
    }
}

async fn resolve_locations(geocoder: &dyn Geocoder, plan: &mut WalkPlan, city: &str) {
    for waypoint in plan.waypoints.iter_mut().filter(|w| w.location.is_none()) {
        let query = place_query(&waypoint.name, city);
        match geocoder.geocode(&query).await {
            Ok(Some(point)) => waypoint.location = Some(point),
            Ok(None) => log::info!("no geocoding result for {query}"),
            Err(e) => log::warn!("geocoding {query} failed: {e:#}"),
        }
    }
}

pub fn walk_title(plan: &WalkPlan, request: &WalkRequest) -> String {
    plan.title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("A dérive through {}", request.city.trim()))
}
