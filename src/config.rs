use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::env;
use std::fs;
use std::path::Path;

use crate::av::Quality;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::load());
}

/// Default wait-gate timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default capacity of the decoder input buffer.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 512 * 1024;

const CONFIG_PATHS: [&str; 2] = ["./h264jpeg.toml", "./config.toml"];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub default_quality: u8,
    pub timeout_ms: u64,
    pub input_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_quality: Quality::DEFAULT.get(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

impl Config {
    fn load() -> Self {
        let mut config = Config::default();

        // Environment first, then the config file overrides it
        if let Ok(value) = env::var("H264JPEG_QUALITY") {
            config.apply("default_quality", &value);
        }
        if let Ok(value) = env::var("H264JPEG_TIMEOUT_MS") {
            config.apply("timeout_ms", &value);
        }
        if let Ok(value) = env::var("H264JPEG_INPUT_BUFFER_SIZE") {
            config.apply("input_buffer_size", &value);
        }

        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                log::debug!("Loading configuration from {}", path);
                config.apply_str(&content);
            }
        }

        config
    }

    /// Applies `key = value` lines; unknown keys and comments are ignored.
    pub fn apply_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                self.apply(key.trim(), value);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "default_quality" | "quality" => match value.parse::<i64>() {
                Ok(q) => {
                    let quality = Quality::or_default(q);
                    if i64::from(quality.get()) != q {
                        log::warn!(
                            "Configured quality {} outside 1-100, using {}",
                            q,
                            quality
                        );
                    }
                    self.default_quality = quality.get();
                }
                Err(e) => log::warn!("Ignoring quality {:?}: {}", value, e),
            },
            "timeout_ms" => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => log::warn!("Ignoring timeout_ms {:?}", value),
            },
            "input_buffer_size" => match value.parse::<usize>() {
                Ok(size) if size > 0 => self.input_buffer_size = size,
                _ => log::warn!("Ignoring input_buffer_size {:?}", value),
            },
            _ => {}
        }
    }

    pub fn reload() {
        let new_config = Config::load();
        *CONFIG.write() = new_config;
    }
}

/// Returns a snapshot of the process-wide configuration
pub fn get() -> Config {
    CONFIG.read().clone()
}

/// Re-reads environment and config files into the process-wide configuration
pub fn reload() {
    Config::reload();
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# h264jpeg configuration

# JPEG quality used when none is given (1-100, out of range falls back to 85)
default_quality = 85

# Upper bound on a single hardware round trip, in milliseconds
timeout_ms = 1000

# Capacity of the decoder input buffer in bytes
input_buffer_size = 524288
"#;
        fs::write(path, template)?;
    }
    Ok(())
}
