use drift_core::types::{MontageFormat, RunId};
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "drift.json";
pub const DEFAULT_STOPS: usize = 5;

/// `drift.json` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// `drift-<run>.mp4` for video, `drift-<run>/` for a frame directory.
pub fn default_output_path(format: MontageFormat, run: &RunId) -> PathBuf {
    match format {
        MontageFormat::Video => PathBuf::from(format!("drift-{}.mp4", run.short())),
        MontageFormat::Frames => PathBuf::from(format!("drift-{}", run.short())),
    }
}

/// Where the montage goes: `explicit` if given, else the default name. A
/// video path without an extension gets `.mp4` so ffmpeg can pick a muxer.
pub fn output_path(explicit: Option<PathBuf>, format: MontageFormat, run: &RunId) -> PathBuf {
    match explicit {
        Some(mut path) if format == MontageFormat::Video && path.extension().is_none() => {
            path.set_extension("mp4");
            path
        }
        Some(path) => path,
        None => default_output_path(format, run),
    }
}
