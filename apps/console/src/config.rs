use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Instrumentation endpoint address, `host:port` or a ws/wss URL.
    pub endpoint: String,
    /// Length of the simulated drive clip.
    pub clip_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "localhost:41000".into(),
            clip_seconds: 30,
        }
    }
}

/// Defaults, overlaid by `console.toml`, overlaid by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("endpoint") {
                settings.endpoint = v.clone();
            }
            if let Some(v) = file_cfg.get("clip_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.clip_seconds = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("CONSOLE_ENDPOINT") {
        settings.endpoint = v;
    }
    if let Ok(v) = std::env::var("APP__ENDPOINT") {
        settings.endpoint = v;
    }

    if let Ok(v) = std::env::var("APP__CLIP_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.clip_seconds = parsed;
        }
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_local_rig() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint, "localhost:41000");
        assert_eq!(settings.clip_seconds, 30);
    }

    #[test]
    fn environment_overrides_endpoint() {
        std::env::set_var("APP__ENDPOINT", "wss://rig.example.com/ws");
        let settings = load_settings();
        std::env::remove_var("APP__ENDPOINT");

        assert_eq!(settings.endpoint, "wss://rig.example.com/ws");
    }

    #[test]
    fn malformed_clip_seconds_keeps_default() {
        std::env::set_var("APP__CLIP_SECONDS", "not-a-number");
        let settings = load_settings();
        std::env::remove_var("APP__CLIP_SECONDS");

        assert_eq!(settings.clip_seconds, 30);
    }
}
