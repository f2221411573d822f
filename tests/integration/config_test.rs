//! Integration tests for configuration management
//!
//! These tests verify that settings and catalog files drive a real engine.

use soundscape_engine::audio::VirtualBackend;
use soundscape_engine::catalog::{Catalog, Category};
use soundscape_engine::config::{ConfigError, Settings};
use soundscape_engine::player::AudioManager;
use std::error::Error;
use std::sync::Arc;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[tokio::test]
    async fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let settings = Settings {
            cache_dir: dir.path().join("cache"),
            initial_volume: 0.5,
            sample_rate: 8_000,
            loop_seconds: 0.25,
            ..Settings::default()
        };
        settings.validate()?;
        settings.save(&config_path)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);

        let manager = AudioManager::start(&loaded, Arc::new(VirtualBackend::new()))?;
        assert_eq!(manager.volume().await, 0.5);
        assert!(manager.play_track("white_noise", true).await);
        assert!(dir.path().join("cache").join("audio_gen").join("white_noise.wav").exists());
        manager.shutdown().await;
        Ok(())
    }

    /// Test custom catalog file replacing the built-in registry
    #[tokio::test]
    async fn test_catalog_file_is_used() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let catalog_path = dir.path().join("catalog.json");
        std::fs::write(
            &catalog_path,
            r#"{
                "tracks": [
                    { "id": "hum", "name": "Hum", "waveform": "sine432", "duration": 60,
                      "category": "meditation", "description": "A low hum" }
                ],
                "soundscapes": [
                    { "id": "hum_mix", "name": "Hum Mix", "description": "Just the hum",
                      "tracks": ["hum"], "category": "meditation", "premium": true }
                ],
                "aliases": { "drone": "hum" }
            }"#,
        )?;

        let settings = Settings {
            cache_dir: dir.path().join("cache"),
            sample_rate: 8_000,
            loop_seconds: 0.25,
            catalog_path: Some(catalog_path),
            ..Settings::default()
        };
        let manager = AudioManager::start(&settings, Arc::new(VirtualBackend::new()))?;

        assert_eq!(manager.available_tracks(None, None).len(), 1);
        assert_eq!(manager.available_soundscapes(Some(Category::Meditation), Some(true)).len(), 1);
        assert!(manager.available_tracks(Some(Category::Nature), None).is_empty());
        assert!(manager.play_track("drone", true).await);
        assert!(!manager.play_track("rain_gentle", true).await);
        assert!(manager.play_soundscape("hum_mix", true).await);
        Ok(())
    }

    /// Test invalid configuration handling
    #[tokio::test]
    async fn test_invalid_settings_are_rejected() {
        let settings = Settings { initial_volume: 2.0, ..Settings::default() };
        let result = AudioManager::start(&settings, Arc::new(VirtualBackend::new()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let dir = tempdir().unwrap();
        let missing = Settings {
            cache_dir: dir.path().to_path_buf(),
            catalog_path: Some(dir.path().join("absent.json")),
            ..Settings::default()
        };
        let result = AudioManager::start(&missing, Arc::new(VirtualBackend::new()));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_builtin_catalog_filters() {
        let catalog = Catalog::builtin();
        let free: Vec<String> = catalog.filter_tracks(None, Some(false)).into_iter().map(|t| t.id).collect();
        assert_eq!(free, vec!["rain_gentle", "ocean_waves", "white_noise"]);
        assert_eq!(catalog.filter_soundscapes(None, Some(false)).len(), 0);
    }

    #[test]
    fn test_logging_installs_once() {
        let _ = soundscape_engine::init_logging();
        assert!(!soundscape_engine::init_logging());
    }
}
