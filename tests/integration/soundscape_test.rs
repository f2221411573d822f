//! Integration tests for soundscape mixes

use crate::test_utils::{approx_eq, start_engine, start_engine_with_catalog, wait_for_event};
use soundscape_engine::audio::BackendCall;
use soundscape_engine::catalog::{Catalog, Category, Soundscape};
use soundscape_engine::player::{EngineEvent, SessionState, SessionTarget};
use std::collections::HashMap;
use std::time::Duration;

fn catalog_with_mix(tracks: &[&str]) -> Catalog {
    let builtin = Catalog::builtin();
    let mut soundscapes = builtin.soundscapes().to_vec();
    soundscapes.push(Soundscape {
        id: "patchy_mix".to_string(),
        name: "Patchy Mix".to_string(),
        description: "References tracks that may not exist".to_string(),
        tracks: tracks.iter().map(|t| t.to_string()).collect(),
        category: Category::Ambient,
        premium: false,
    });
    Catalog::new(builtin.tracks().to_vec(), soundscapes, HashMap::new()).expect("valid catalog")
}

#[cfg(test)]
mod soundscape_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_soundscape_plays_every_track_at_mix_gain() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("rainy_forest", true).await);

        let handles = te.backend.active_handles();
        assert_eq!(handles.len(), 2);
        for handle in &handles {
            assert!(approx_eq(te.backend.volume_of(*handle).unwrap(), 0.7 * 0.7));
        }

        let paths: Vec<String> = handles
            .iter()
            .filter_map(|h| te.backend.path_of(*h))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert!(paths.contains(&"rain_gentle.wav".to_string()));
        assert!(paths.contains(&"forest_birds.wav".to_string()));

        match te.manager.current_track().await {
            Some(SessionTarget::Soundscape(s)) => assert_eq!(s.id, "rainy_forest"),
            other => panic!("unexpected current target: {:?}", other),
        }
        assert!(te.manager.is_playing().await);
    }

    #[tokio::test]
    async fn test_volume_change_scales_mix() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("ocean_meditation", true).await);

        te.manager.set_volume(1.0).await;
        for handle in te.backend.active_handles() {
            assert!(approx_eq(te.backend.volume_of(handle).unwrap(), 0.7));
        }
        te.manager.set_volume(0.5).await;
        for handle in te.backend.active_handles() {
            assert!(approx_eq(te.backend.volume_of(handle).unwrap(), 0.35));
        }
    }

    #[tokio::test]
    async fn test_unknown_track_in_mix_is_skipped() {
        let te = start_engine_with_catalog(catalog_with_mix(&["rain_gentle", "missing_track"]), 0.25);
        assert!(te.manager.play_soundscape("patchy_mix", true).await);

        assert!(te.manager.is_playing().await);
        assert_eq!(te.backend.active_handles().len(), 1);
        let error = te.manager.last_error().await.unwrap();
        assert!(error.contains("missing_track"), "{}", error);
    }

    #[tokio::test]
    async fn test_mix_with_no_playable_tracks_fails() {
        let te = start_engine_with_catalog(catalog_with_mix(&["ghost_a", "ghost_b"]), 0.25);
        assert!(!te.manager.play_soundscape("patchy_mix", true).await);
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.manager.last_error().await.is_some());

        let empty = start_engine_with_catalog(catalog_with_mix(&[]), 0.25);
        assert!(!empty.manager.play_soundscape("patchy_mix", true).await);
        assert!(empty.manager.last_error().await.unwrap().contains("no tracks"));
    }

    #[tokio::test]
    async fn test_unknown_soundscape_reports_error() {
        let te = start_engine(0.25);
        assert!(!te.manager.play_soundscape("underwater_disco", true).await);
        assert!(te.manager.last_error().await.unwrap().contains("underwater_disco"));
        assert_eq!(te.backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_other_tracks() {
        let te = start_engine(0.25);
        te.backend.fail_loads_matching("campfire");
        assert!(te.manager.play_soundscape("cozy_evening", true).await);
        assert_eq!(te.backend.active_handles().len(), 1);
        assert!(te.manager.last_error().await.unwrap().contains("campfire"));
    }

    #[tokio::test]
    async fn test_shared_tracks_render_once() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("rainy_forest", true).await);
        assert!(te.manager.play_soundscape("cozy_evening", true).await);
        assert!(te.manager.play_track("rain_gentle", true).await);

        // rain_gentle, forest_birds and campfire
        assert_eq!(te.generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_switching_to_track_releases_mix() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("focus_zone", true).await);
        let mix_handles = te.backend.active_handles();
        assert_eq!(mix_handles.len(), 2);

        assert!(te.manager.play_track("white_noise", true).await);
        let active = te.backend.active_handles();
        assert_eq!(active.len(), 1);
        assert!(mix_handles.iter().all(|h| !active.contains(h)));
        assert!(approx_eq(te.backend.volume_of(active[0]).unwrap(), 0.7));
    }

    #[tokio::test]
    async fn test_pause_applies_to_whole_mix() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("rainy_forest", true).await);

        te.manager.pause().await;
        for handle in te.backend.active_handles() {
            assert_eq!(te.backend.is_paused(handle), Some(true));
        }
        te.manager.resume().await;
        for handle in te.backend.active_handles() {
            assert_eq!(te.backend.is_paused(handle), Some(false));
        }
        let resumes = te.backend.calls().iter().filter(|c| matches!(c, BackendCall::Resume(_))).count();
        assert_eq!(resumes, 2);
    }

    #[tokio::test]
    async fn test_mix_finishes_after_last_track() {
        let te = start_engine(0.2);
        let mut events = te.manager.subscribe();
        assert!(te.manager.play_soundscape("ocean_meditation", false).await);

        let finished = wait_for_event(&mut events, Duration::from_secs(5), |e| matches!(e, EngineEvent::Finished { .. })).await;
        assert_eq!(finished, Some(EngineEvent::Finished { target_id: "ocean_meditation".to_string() }));
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert_eq!(te.backend.unload_count(), 2);
    }

    #[tokio::test]
    async fn test_one_failing_mix_track_keeps_session() {
        let te = start_engine(0.25);
        assert!(te.manager.play_soundscape("rainy_forest", true).await);
        let handles = te.backend.active_handles();

        let mut events = te.manager.subscribe();
        assert!(te.backend.inject_failure(handles[0], "device lost"));
        assert!(wait_for_event(&mut events, Duration::from_secs(5), |e| matches!(e, EngineEvent::Error(_))).await.is_some());

        assert_eq!(te.manager.state().await, SessionState::Playing);
        assert_eq!(te.backend.active_handles(), vec![handles[1]]);
    }
}
