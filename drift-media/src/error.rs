#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("ffmpeg/ffprobe binary not found: {0}")]
    FfmpegNotFound(std::io::Error),

    #[error("ffmpeg/ffprobe failed (exit code {exit_code:?}): {stderr}")]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse ffprobe output: {0}")]
    Probe(String),

    #[error("no frames to assemble")]
    Empty,

    #[error("failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
