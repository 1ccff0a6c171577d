use drift_core::config::{MissingImagePolicy, MontageSettings};
use serde::Serialize;

/// What a scene brings to the timeline once its images have been decoded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneInput {
    pub usable_images: usize,
    // Headings with no usable image (not found, failed, or undecodable).
    pub missing_images: usize,
    pub has_narration: bool,
    pub narration_secs: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameSource {
    /// `image`-th usable image of input scene `scene`.
    Image { scene: usize, image: usize },
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineFrame {
    pub scene: usize,
    pub source: FrameSource,
    pub start_secs: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSlot {
    pub scene: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub has_narration: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    pub frames: Vec<TimelineFrame>,
    pub scenes: Vec<SceneSlot>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.scenes
            .last()
            .map(|s| s.start_secs + s.duration_secs)
            .unwrap_or(0.0)
    }

    pub fn has_audio(&self) -> bool {
        self.scenes.iter().any(|s| s.has_narration)
    }
}

/// Lays scenes end to end and decides which picture fills every frame slot.
///
/// A scene lasts as long as its narration (never less than `min_scene_secs`),
/// or `seconds_per_image` per frame when silent. Its frames split that time
/// evenly. Scenes left with no frames under `Skip` are dropped along with
/// their narration.
pub fn plan_timeline(inputs: &[SceneInput], settings: &MontageSettings) -> Timeline {
    let mut timeline = Timeline::default();
    let mut last_image: Option<FrameSource> = None;
    let mut cursor = 0.0f64;

    for (scene, input) in inputs.iter().enumerate() {
        let mut sources: Vec<FrameSource> = (0..input.usable_images)
            .map(|image| FrameSource::Image { scene, image })
            .collect();
        if let Some(last) = sources.last() {
            last_image = Some(*last);
        }

        let filler = match settings.missing_image {
            MissingImagePolicy::RepeatPrevious => {
                Some(last_image.unwrap_or(FrameSource::Placeholder))
            }
            MissingImagePolicy::Placeholder => Some(FrameSource::Placeholder),
            MissingImagePolicy::Skip => None,
        };
        if let Some(filler) = filler {
            sources.extend(std::iter::repeat_n(filler, input.missing_images));
        }

        if sources.is_empty() {
            log::warn!("scene {scene} has no frames; dropping it from the montage");
            continue;
        }

        let silent_secs = settings.seconds_per_image * sources.len() as f64;
        let duration_secs = if input.has_narration {
            input
                .narration_secs
                .unwrap_or(silent_secs)
                .max(settings.min_scene_secs)
        } else {
            silent_secs
        };

        let per_frame = duration_secs / sources.len() as f64;
        for (i, source) in sources.into_iter().enumerate() {
            timeline.frames.push(TimelineFrame {
                scene,
                source,
                start_secs: cursor + per_frame * i as f64,
                duration_secs: per_frame,
            });
        }
        timeline.scenes.push(SceneSlot {
            scene,
            start_secs: cursor,
            duration_secs,
            has_narration: input.has_narration,
        });
        cursor += duration_secs;
    }

    timeline
}
