//! ffmpeg command construction and invocation for the video render.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::MediaError;

/// One still in the concat list, shown for `duration_secs`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatEntry {
    pub file: PathBuf,
    pub duration_secs: f64,
}

/// A narration clip and where it starts on the montage timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlacement {
    pub file: PathBuf,
    pub offset_secs: f64,
}

/// Body of an ffconcat file for the concat demuxer.
///
/// The last file is listed twice; the demuxer otherwise ignores the final
/// `duration` line.
pub fn concat_list(entries: &[ConcatEntry]) -> String {
    let mut out = String::from("ffconcat version 1.0\n");
    for e in entries {
        out.push_str(&format!("file '{}'\n", escape_concat_path(&e.file)));
        out.push_str(&format!("duration {:.3}\n", e.duration_secs));
    }
    if let Some(last) = entries.last() {
        out.push_str(&format!("file '{}'\n", escape_concat_path(&last.file)));
    }
    out
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// `-filter_complex` graph that delays each narration input to its offset and
/// mixes them into `[aout]`. Audio inputs start at ffmpeg input index 1.
pub fn narration_filter(clips: &[AudioPlacement]) -> Option<String> {
    if clips.is_empty() {
        return None;
    }

    let mut parts: Vec<String> = clips
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let delay_ms = (c.offset_secs.max(0.0) * 1000.0).round() as u64;
            format!("[{}:a]adelay=delays={delay_ms}:all=1[a{i}]", i + 1)
        })
        .collect();

    if clips.len() == 1 {
        parts[0] = parts[0].replace("[a0]", "[aout]");
    } else {
        let labels: String = (0..clips.len()).map(|i| format!("[a{i}]")).collect();
        parts.push(format!(
            "{labels}amix=inputs={}:duration=longest:normalize=0[aout]",
            clips.len()
        ));
    }
    Some(parts.join(";"))
}

/// Full argument list for rendering the concat list (plus narration) to H.264/AAC.
pub fn video_args(
    concat_file: &Path,
    clips: &[AudioPlacement],
    fps: u32,
    total_secs: f64,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        concat_file.into(),
    ];
    for c in clips {
        args.push("-i".into());
        args.push(c.file.clone().into());
    }

    if let Some(filter) = narration_filter(clips) {
        args.extend(
            [
                "-filter_complex",
                filter.as_str(),
                "-map",
                "0:v",
                "-map",
                "[aout]",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
            ]
            .map(OsString::from),
        );
    }

    let vf = format!("fps={fps},format=yuv420p");
    let duration = format!("{total_secs:.3}");
    args.extend(
        [
            "-vf",
            vf.as_str(),
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-movflags",
            "+faststart",
            "-t",
            duration.as_str(),
        ]
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Runs `bin` with `args`, mapping a missing binary and a non-zero exit to
/// typed errors.
pub async fn run(bin: &str, args: &[OsString]) -> Result<(), MediaError> {
    log::debug!("running {bin} with {} args", args.len());
    let output = tokio::process::Command::new(bin)
        .args(args)
        .output()
        .await
        .map_err(MediaError::FfmpegNotFound)?;

    if !output.status.success() {
        return Err(MediaError::FfmpegFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Duration reported by `ffprobe -show_format` JSON. `None` when the
/// container does not state one.
pub fn parse_probe_duration(stdout: &[u8]) -> Result<Option<f64>, MediaError> {
    let out: FfprobeOutput = serde_json::from_slice(stdout).map_err(|e| {
        MediaError::Probe(format!("{e}: {}", String::from_utf8_lossy(stdout).trim()))
    })?;
    Ok(out
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0))
}

/// Runs `ffprobe` on an audio file and returns its duration in seconds.
pub async fn probe_duration(bin: &str, path: &Path) -> Result<Option<f64>, MediaError> {
    let output = tokio::process::Command::new(bin)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(MediaError::FfmpegNotFound)?;

    if !output.status.success() {
        return Err(MediaError::FfmpegFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_probe_duration(&output.stdout)
}
