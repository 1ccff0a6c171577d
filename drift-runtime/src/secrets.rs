//! API keys come from the environment, optionally seeded from a `.env` file.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    OpenAiApiKey,
    GoogleMapsApiKey,
}

impl SecretKey {
    pub fn env_var(self) -> &'static str {
        match self {
            SecretKey::OpenAiApiKey => "OPENAI_API_KEY",
            SecretKey::GoogleMapsApiKey => "GMAPS_API_KEY",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{var} is not set (export it or put it in a .env file)")]
pub struct MissingSecret {
    pub var: &'static str,
}

/// Loads `.env` from the working directory (or a parent) if one exists.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("ignoring unreadable .env file: {e}"),
    }
}

pub fn get_secret(key: SecretKey) -> Option<String> {
    read_secret(key, |var| std::env::var(var).ok())
}

pub fn require_secret(key: SecretKey) -> Result<String, MissingSecret> {
    get_secret(key).ok_or(MissingSecret { var: key.env_var() })
}

fn read_secret(key: SecretKey, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup(key.env_var())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ApiKeys {
    pub openai: String,
    pub google_maps: String,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &"[REDACTED]")
            .field("google_maps", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeys {
    pub fn from_env() -> Result<Self, MissingSecret> {
        Ok(Self {
            openai: require_secret(SecretKey::OpenAiApiKey)?,
            google_maps: require_secret(SecretKey::GoogleMapsApiKey)?,
        })
    }
}
