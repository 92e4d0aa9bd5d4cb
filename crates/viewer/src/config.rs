use common::Environment;
use protocol::Resolution;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    pub log_level: LogLevel,
    pub environment: Environment,
    /// Backend page or socket URL; only scheme and host are used.
    pub server_url: String,
    /// Comma separated sub-protocols to open.
    pub channels: String,
    pub camera_device: Option<String>,
    /// `WxH`, must be one of the device's offered resolutions.
    pub camera_resolution: Option<String>,
    pub model: Option<String>,
    pub snapshot_path: Option<String>,
    pub snapshot_every: u64,
    pub connect_poll_ms: u64,
    pub frames_per_tick: u32,
}

impl ViewerConfig {
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        let raw = self.camera_resolution.as_deref()?;
        let parsed = Resolution::parse(raw);
        if parsed.is_none() {
            tracing::warn!(value = raw, "Ignoring unparsable camera resolution");
        }
        parsed
    }
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", Environment::from_env().as_str())?
        .set_default("server_url", "http://127.0.0.1:7681")?
        .set_default("channels", "camera,drpai")?
        .set_default("snapshot_every", 30)?
        .set_default("connect_poll_ms", 500)?
        .set_default("frames_per_tick", 30)
}

pub fn get_configuration() -> Result<ViewerConfig, config::ConfigError> {
    let config = builder()?
        .add_source(
            config::Environment::with_prefix("VIEWER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<ViewerConfig>()
}
