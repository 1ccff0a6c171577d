use anyhow::Context;
use drift_core::config::AppConfig;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(&self) -> anyhow::Result<AppConfig> {
        if !self.path.exists() {
            log::info!(
                "no config at {}; using defaults",
                self.path.display()
            );
            return Ok(AppConfig::default());
        }
        self.load()
    }

    /// Writes to a temp file beside the target, then renames it over the
    /// target. Readers see the old config or the new one, never a torn write.
    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create config directory: {}", parent.display()))?;
                parent
            }
            None => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp config in {}", dir.display()))?;
        tmp.write_all(&json).context("write temp config")?;
        tmp.as_file().sync_all().context("flush temp config")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replace config: {}", self.path.display()))?;

        log::info!("saved config to {}", self.path.display());
        Ok(())
    }
}
