use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use drift_core::config::{FrameEffect, MontageSettings};
use drift_core::types::{Montage, MontageFormat};
use drift_engine::traits::{MontageAssembler, NarrationClip, SceneAsset};
use image::RgbImage;
use image::imageops::FilterType;
use serde::Serialize;

use crate::effects::{EdgeGlow, psychedelic, pulse_intensity, pulse_slots};
use crate::error::MediaError;
use crate::ffmpeg::{self, AudioPlacement, ConcatEntry};
use crate::timeline::{FrameSource, SceneInput, Timeline, plan_timeline};
use crate::wav::wav_duration_secs;

const CONCAT_FILE: &str = "frames.ffconcat";
const MANIFEST_FILE: &str = "manifest.json";

/// Turns gathered scenes into a video (via ffmpeg) or a frame directory,
/// depending on `MontageSettings::format`.
#[derive(Debug, Clone)]
pub struct MediaAssembler {
    settings: MontageSettings,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl MediaAssembler {
    pub fn new(settings: MontageSettings) -> Self {
        Self {
            settings,
            ffmpeg_bin: "ffmpeg".into(),
            ffprobe_bin: "ffprobe".into(),
        }
    }

    pub fn with_ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    pub fn with_ffprobe_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffprobe_bin = bin.into();
        self
    }

    /// Fills in the length of clips whose header we cannot read ourselves
    /// (mp3, aac). A clip left without a length gets a fixed scene slot and
    /// may overlap the next one.
    async fn probe_narration(&self, scenes: &mut [SceneAsset]) {
        for scene in scenes.iter_mut() {
            let Some(clip) = scene.narration.as_mut() else {
                continue;
            };
            if clip_duration(clip).is_some() {
                continue;
            }
            match self.probe_clip(clip).await {
                Ok(Some(secs)) => clip.duration_secs = Some(secs),
                Ok(None) => log::warn!(
                    "no duration for {} narration of {}",
                    clip.format,
                    scene.waypoint.name
                ),
                Err(e) => log::warn!(
                    "could not probe {} narration of {}: {e:#}",
                    clip.format,
                    scene.waypoint.name
                ),
            }
        }
    }

    async fn probe_clip(&self, clip: &NarrationClip) -> anyhow::Result<Option<f64>> {
        let file = tempfile::Builder::new()
            .prefix("drift-narration-")
            .suffix(&format!(".{}", clip.format))
            .tempfile()
            .context("create narration probe file")?;
        tokio::fs::write(file.path(), &clip.bytes)
            .await
            .context("write narration probe file")?;
        Ok(ffmpeg::probe_duration(&self.ffprobe_bin, file.path()).await?)
    }

    async fn render_frames(
        &self,
        title: &str,
        scenes: Vec<SceneAsset>,
        dir: &Path,
    ) -> anyhow::Result<Montage> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create frame directory {}", dir.display()))?;

        let stills = self.render_stills(scenes, dir).await?;
        let clips = write_narration(&stills, dir).await?;

        let manifest = Manifest {
            title,
            fps: self.settings.fps,
            width: self.settings.frame_width,
            height: self.settings.frame_height,
            duration_secs: stills.timeline.duration_secs(),
            frames: stills
                .rendered
                .iter()
                .zip(&stills.entries)
                .map(|(r, e)| {
                    let f = &stills.timeline.frames[r.frame];
                    ManifestFrame {
                        file: file_name(&e.file),
                        stop: &stills.scenes[f.scene].name,
                        start_secs: r.start_secs,
                        duration_secs: e.duration_secs,
                        placeholder: f.source == FrameSource::Placeholder,
                    }
                })
                .collect(),
            narration: clips
                .iter()
                .map(|(scene, c)| ManifestClip {
                    file: file_name(&c.file),
                    stop: &stills.scenes[*scene].name,
                    offset_secs: c.offset_secs,
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(MediaError::from)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), json)
            .await
            .context("write manifest")?;

        Ok(stills.montage(dir, MontageFormat::Frames, !clips.is_empty()))
    }

    async fn render_video(
        &self,
        scenes: Vec<SceneAsset>,
        output: &Path,
    ) -> anyhow::Result<Montage> {
        let work = tempfile::tempdir().context("create montage work directory")?;
        let stills = self.render_stills(scenes, work.path()).await?;
        let clips = write_narration(&stills, work.path()).await?;
        let clips: Vec<AudioPlacement> = clips.into_iter().map(|(_, c)| c).collect();

        let concat_path = work.path().join(CONCAT_FILE);
        tokio::fs::write(&concat_path, ffmpeg::concat_list(&stills.entries))
            .await
            .context("write concat list")?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }

        let args = ffmpeg::video_args(
            &concat_path,
            &clips,
            self.settings.fps,
            stills.timeline.duration_secs(),
            output,
        );
        log::info!(
            "rendering {} images ({:.1}s, {} narration clips) to {}",
            stills.entries.len(),
            stills.timeline.duration_secs(),
            clips.len(),
            output.display()
        );
        ffmpeg::run(&self.ffmpeg_bin, &args).await?;

        Ok(stills.montage(output, MontageFormat::Video, !clips.is_empty()))
    }

    /// Decodes, plans and writes every timeline frame as a PNG under `dir`.
    async fn render_stills(&self, mut scenes: Vec<SceneAsset>, dir: &Path) -> anyhow::Result<Stills> {
        self.probe_narration(&mut scenes).await;
        let settings = self.settings.clone();
        let dir = dir.to_path_buf();
        let stills = tokio::task::spawn_blocking(move || render_stills_blocking(scenes, &settings, &dir))
            .await
            .context("frame render task failed")??;
        Ok(stills)
    }
}

#[async_trait]
impl MontageAssembler for MediaAssembler {
    async fn assemble(
        &self,
        title: &str,
        scenes: Vec<SceneAsset>,
        output: &Path,
    ) -> anyhow::Result<Montage> {
        if scenes.is_empty() {
            return Err(MediaError::Empty.into());
        }
        match self.settings.format {
            MontageFormat::Frames => self.render_frames(title, scenes, output).await,
            MontageFormat::Video => self.render_video(scenes, output).await,
        }
    }
}

struct DecodedScene {
    name: String,
    images: Vec<RgbImage>,
    narration: Option<NarrationClip>,
}

/// Where a written PNG sits on the timeline. Without an effect there is one
/// per timeline frame; the psychedelic pulse splits each into frame-rate slots.
struct RenderedFrame {
    frame: usize,
    start_secs: f64,
}

struct Stills {
    scenes: Vec<DecodedScene>,
    timeline: Timeline,
    entries: Vec<ConcatEntry>,
    rendered: Vec<RenderedFrame>,
}

impl Stills {
    fn montage(&self, path: &Path, format: MontageFormat, has_audio: bool) -> Montage {
        Montage {
            path: path.to_path_buf(),
            format,
            scenes: self.timeline.scenes.len(),
            frames: self.timeline.frames.len(),
            duration_secs: self.timeline.duration_secs(),
            has_audio,
        }
    }
}

fn render_stills_blocking(
    scenes: Vec<SceneAsset>,
    settings: &MontageSettings,
    dir: &Path,
) -> Result<Stills, MediaError> {
    let (w, h) = (settings.frame_width.max(2), settings.frame_height.max(2));

    let mut decoded = Vec::with_capacity(scenes.len());
    let mut inputs = Vec::with_capacity(scenes.len());
    for scene in scenes {
        let mut images = Vec::with_capacity(scene.images.len());
        let mut missing = scene.missing_images;
        for img in &scene.images {
            match image::load_from_memory(&img.bytes) {
                Ok(d) => images.push(d.resize_to_fill(w, h, FilterType::Triangle).to_rgb8()),
                Err(e) => {
                    log::warn!(
                        "undecodable street view image for {} (heading {}): {e}",
                        scene.waypoint.name,
                        img.heading
                    );
                    missing += 1;
                }
            }
        }

        let narration_secs = scene.narration.as_ref().and_then(clip_duration);
        inputs.push(SceneInput {
            usable_images: images.len(),
            missing_images: missing,
            has_narration: scene.narration.is_some(),
            narration_secs,
        });
        decoded.push(DecodedScene {
            name: scene.waypoint.name,
            images,
            narration: scene.narration,
        });
    }

    let timeline = plan_timeline(&inputs, settings);
    if timeline.is_empty() {
        return Err(MediaError::Empty);
    }

    let placeholder = RgbImage::new(w, h);
    let mut entries = Vec::with_capacity(timeline.frames.len());
    let mut rendered = Vec::with_capacity(timeline.frames.len());
    let mut write = |img: &RgbImage,
                     frame: usize,
                     start_secs: f64,
                     duration_secs: f64|
     -> Result<(), MediaError> {
        let file = dir.join(format!("frame_{:05}.png", entries.len()));
        img.save(&file)?;
        entries.push(ConcatEntry {
            file,
            duration_secs,
        });
        rendered.push(RenderedFrame { frame, start_secs });
        Ok(())
    };

    for (i, frame) in timeline.frames.iter().enumerate() {
        let base = match frame.source {
            FrameSource::Image { scene, image } => &decoded[scene].images[image],
            FrameSource::Placeholder => &placeholder,
        };
        match settings.effect {
            FrameEffect::None => write(base, i, frame.start_secs, frame.duration_secs)?,
            FrameEffect::Psychedelic => {
                let edges = EdgeGlow::of(base);
                for (t, d) in pulse_slots(frame.start_secs, frame.duration_secs, settings.fps) {
                    write(&psychedelic(base, &edges, pulse_intensity(t)), i, t, d)?;
                }
            }
        }
    }

    Ok(Stills {
        scenes: decoded,
        timeline,
        entries,
        rendered,
    })
}

fn clip_duration(clip: &NarrationClip) -> Option<f64> {
    clip.duration_secs.or_else(|| {
        clip.format
            .eq_ignore_ascii_case("wav")
            .then(|| wav_duration_secs(&clip.bytes))
            .flatten()
    })
}

/// Writes the narration of every scene that made it onto the timeline.
async fn write_narration(
    stills: &Stills,
    dir: &Path,
) -> anyhow::Result<Vec<(usize, AudioPlacement)>> {
    let mut out = vec![];
    for slot in stills.timeline.scenes.iter().filter(|s| s.has_narration) {
        let Some(clip) = &stills.scenes[slot.scene].narration else {
            continue;
        };
        let file = dir.join(format!("narration_{:02}.{}", slot.scene, clip.format));
        tokio::fs::write(&file, &clip.bytes)
            .await
            .with_context(|| format!("write {}", file.display()))?;
        out.push((
            slot.scene,
            AudioPlacement {
                file,
                offset_secs: slot.start_secs,
            },
        ));
    }
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Serialize)]
struct Manifest<'a> {
    title: &'a str,
    fps: u32,
    width: u32,
    height: u32,
    duration_secs: f64,
    frames: Vec<ManifestFrame<'a>>,
    narration: Vec<ManifestClip<'a>>,
}

#[derive(Serialize)]
struct ManifestFrame<'a> {
    file: String,
    stop: &'a str,
    start_secs: f64,
    duration_secs: f64,
    placeholder: bool,
}

#[derive(Serialize)]
struct ManifestClip<'a> {
    file: String,
    stop: &'a str,
    offset_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::config::MissingImagePolicy;
    use drift_core::types::Waypoint;
    use drift_engine::traits::StreetImage;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 18, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn scene(index: usize, name: &str, images: Vec<Vec<u8>>, missing: usize) -> SceneAsset {
        let mut s = SceneAsset::new(index, Waypoint::named(name));
        s.images = images
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| StreetImage {
                heading: 90.0 * i as f32,
                content_type: Some("image/png".into()),
                bytes,
            })
            .collect();
        s.missing_images = missing;
        s
    }

    fn frames_settings() -> MontageSettings {
        MontageSettings {
            format: MontageFormat::Frames,
            frame_width: 64,
            frame_height: 36,
            seconds_per_image: 1.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn frames_output_writes_pngs_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("walk");
        let scenes = vec![
            scene(0, "Dolores Park", vec![png([200, 0, 0]), png([0, 200, 0])], 0),
            scene(1, "Mission Dolores", vec![], 2),
            scene(2, "Valencia Street", vec![png([0, 0, 200])], 1),
        ];

        let montage = MediaAssembler::new(frames_settings())
            .assemble("Fog", scenes, &out)
            .await
            .unwrap();

        assert_eq!(montage.format, MontageFormat::Frames);
        assert_eq!(montage.scenes, 3);
        assert_eq!(montage.frames, 6);
        assert_eq!(montage.duration_secs, 6.0);
        assert!(!montage.has_audio);

        // Mission Dolores had nothing; it repeats the last Dolores Park frame.
        let repeated = image::open(out.join("frame_00002.png")).unwrap().to_rgb8();
        assert_eq!(repeated.dimensions(), (64, 36));
        assert_eq!(repeated.get_pixel(10, 10), &Rgb([0, 200, 0]));

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(out.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest["title"], "Fog");
        assert_eq!(manifest["frames"].as_array().unwrap().len(), 6);
        assert_eq!(manifest["frames"][2]["stop"], "Mission Dolores");
        assert_eq!(manifest["frames"][5]["file"], "frame_00005.png");
    }

    #[tokio::test]
    async fn narration_is_written_at_scene_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = scene(0, "Dolores Park", vec![png([1, 2, 3])], 0);
        first.narration = Some(NarrationClip {
            format: "wav".into(),
            duration_secs: Some(4.0),
            bytes: vec![1, 2, 3],
        });
        let mut second = scene(1, "Valencia Street", vec![png([4, 5, 6])], 0);
        second.narration = Some(NarrationClip {
            format: "wav".into(),
            duration_secs: Some(1.0),
            bytes: vec![4, 5, 6],
        });

        let montage = MediaAssembler::new(frames_settings())
            .assemble("t", vec![first, second], dir.path())
            .await
            .unwrap();

        assert!(montage.has_audio);
        assert_eq!(montage.duration_secs, 7.0);
        assert_eq!(std::fs::read(dir.path().join("narration_01.wav")).unwrap(), vec![4, 5, 6]);

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["narration"][1]["offset_secs"], 4.0);
        assert_eq!(manifest["narration"][1]["stop"], "Valencia Street");
    }

    #[tokio::test]
    async fn undecodable_images_fall_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MontageSettings {
            missing_image: MissingImagePolicy::Placeholder,
            ..frames_settings()
        };
        let scenes = vec![scene(0, "Pier", vec![b"not an image".to_vec()], 0)];

        let montage = MediaAssembler::new(settings)
            .assemble("t", scenes, dir.path())
            .await
            .unwrap();
        assert_eq!(montage.frames, 1);
        let frame = image::open(dir.path().join("frame_00000.png")).unwrap().to_rgb8();
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[tokio::test]
    async fn nothing_to_show_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MontageSettings {
            missing_image: MissingImagePolicy::Skip,
            ..frames_settings()
        };
        let err = MediaAssembler::new(settings)
            .assemble("t", vec![scene(0, "Pier", vec![], 4)], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<MediaError>(), Some(MediaError::Empty)));
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MontageSettings {
            format: MontageFormat::Video,
            ..frames_settings()
        };
        let err = MediaAssembler::new(settings)
            .with_ffmpeg_bin("/nonexistent/ffmpeg-for-drift-tests")
            .assemble(
                "t",
                vec![scene(0, "Pier", vec![png([9, 9, 9])], 0)],
                &dir.path().join("walk.mp4"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MediaError>(),
            Some(MediaError::FfmpegNotFound(_))
        ));
    }

    #[tokio::test]
    async fn psychedelic_pulse_varies_within_a_still() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MontageSettings {
            effect: FrameEffect::Psychedelic,
            fps: 4,
            seconds_per_image: 1.5,
            ..frames_settings()
        };
        // A bright stripe gives the shift something to move.
        let mut stripe = RgbImage::new(64, 36);
        for y in 0..36 {
            stripe.put_pixel(32, y, Rgb([255, 0, 255]));
        }
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(stripe)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        let scenes = vec![scene(0, "Haight", vec![bytes.into_inner(), png([0, 0, 0])], 0)];

        let montage = MediaAssembler::new(settings)
            .assemble("t", scenes, dir.path())
            .await
            .unwrap();
        assert_eq!(montage.frames, 2);
        assert_eq!(montage.duration_secs, 3.0);

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        let frames = manifest["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 12);
        assert_eq!(frames[1]["start_secs"], 0.25);
        assert_eq!(frames[6]["start_secs"], 1.5);
        assert_eq!(frames[6]["stop"], "Haight");

        // t=0 pulses at 0.5, t=0.25 at 0.8: the stripe splits further apart.
        let at_zero = image::open(dir.path().join("frame_00000.png")).unwrap().to_rgb8();
        let at_quarter = image::open(dir.path().join("frame_00001.png")).unwrap().to_rgb8();
        assert_ne!(at_zero, at_quarter);
    }

    fn mp3_clip(bytes: Vec<u8>) -> NarrationClip {
        NarrationClip {
            format: "mp3".into(),
            duration_secs: None,
            bytes,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn compressed_narration_is_measured_with_ffprobe() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ffprobe = dir.path().join("fake-ffprobe");
        std::fs::write(
            &ffprobe,
            "#!/bin/sh\necho '{\"format\":{\"duration\":\"4.500000\"}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&ffprobe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut first = scene(0, "Dolores Park", vec![png([1, 2, 3])], 0);
        first.narration = Some(mp3_clip(vec![0xFF, 0xFB, 0x90]));
        let mut second = scene(1, "Valencia Street", vec![png([4, 5, 6])], 0);
        second.narration = Some(mp3_clip(vec![0xFF, 0xFB, 0x90]));

        let out = dir.path().join("walk");
        let montage = MediaAssembler::new(frames_settings())
            .with_ffprobe_bin(ffprobe.to_string_lossy())
            .assemble("t", vec![first, second], &out)
            .await
            .unwrap();

        // Each 4.5 s clip gets its own slot; nothing overlaps.
        assert_eq!(montage.duration_secs, 9.0);
        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(out.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest["narration"][1]["offset_secs"], 4.5);
        assert_eq!(manifest["narration"][1]["file"], "narration_01.mp3");
    }

    #[tokio::test]
    async fn unmeasurable_narration_keeps_fixed_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut only = scene(0, "Pier", vec![png([9, 9, 9])], 0);
        only.narration = Some(mp3_clip(vec![1, 2, 3]));

        let montage = MediaAssembler::new(frames_settings())
            .with_ffprobe_bin("/nonexistent/ffprobe-for-drift-tests")
            .assemble("t", vec![only], dir.path())
            .await
            .unwrap();
        assert!(montage.has_audio);
        assert_eq!(montage.duration_secs, 3.0);
    }

    #[test]
    fn clip_duration_falls_back_to_wav_header() {
        let clip = NarrationClip {
            format: "mp3".into(),
            duration_secs: None,
            bytes: vec![0; 8],
        };
        assert_eq!(clip_duration(&clip), None);
        let clip = NarrationClip {
            duration_secs: Some(2.5),
            ..clip
        };
        assert_eq!(clip_duration(&clip), Some(2.5));
    }
}
