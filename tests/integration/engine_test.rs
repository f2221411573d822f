//! Integration tests for single-track playback through the engine facade

use crate::test_utils::{approx_eq, start_engine, wait_for_event};
use soundscape_engine::audio::BackendCall;
use soundscape_engine::player::{EngineEvent, SessionState, SessionTarget};
use std::error::Error;
use std::time::Duration;

#[cfg(test)]
mod engine_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_play_track_starts_one_sound() -> Result<(), Box<dyn Error>> {
        let te = start_engine(0.25);
        let mut events = te.manager.subscribe();

        assert!(te.manager.play_track("rain_gentle", true).await);
        assert!(te.manager.is_playing().await);
        assert_eq!(te.manager.state().await, SessionState::Playing);
        assert_eq!(te.backend.active_handles().len(), 1);

        match te.manager.current_track().await {
            Some(SessionTarget::Track(track)) => assert_eq!(track.id, "rain_gentle"),
            other => panic!("unexpected current target: {:?}", other),
        }

        assert_eq!(events.recv().await?, EngineEvent::StateChanged { from: SessionState::Idle, to: SessionState::Loading });
        assert_eq!(events.recv().await?, EngineEvent::StateChanged { from: SessionState::Loading, to: SessionState::Playing });
        assert_eq!(events.recv().await?, EngineEvent::Loaded { target_id: "rain_gentle".to_string(), handles: 1 });
        Ok(())
    }

    #[tokio::test]
    async fn test_new_track_replaces_previous() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("rain_gentle", true).await);
        let first = te.backend.active_handles()[0];

        assert!(te.manager.play_track("ocean_waves", true).await);
        let active = te.backend.active_handles();
        assert_eq!(active.len(), 1);
        assert_ne!(active[0], first);

        let calls = te.backend.calls();
        let unload_first = calls.iter().position(|c| *c == BackendCall::Unload(first)).unwrap();
        let load_second = calls
            .iter()
            .position(|c| matches!(c, BackendCall::Load { handle, .. } if *handle == active[0]))
            .unwrap();
        assert!(unload_first < load_second, "previous sound must be released before the next loads");
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("ocean_waves".to_string()));
    }

    #[tokio::test]
    async fn test_alias_resolves_to_track() {
        let te = start_engine(0.25);
        assert_eq!(te.manager.resolve_alias("sleep_sounds"), "rain_gentle");
        assert_eq!(te.manager.resolve_alias("white_noise"), "white_noise");

        assert!(te.manager.play_track("gentle_waves", true).await);
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("ocean_waves".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_track_reports_error() {
        let te = start_engine(0.25);
        assert!(!te.manager.play_track("does_not_exist", true).await);
        assert!(!te.manager.is_playing().await);
        assert_eq!(te.manager.state().await, SessionState::Idle);
        let error = te.manager.last_error().await.unwrap();
        assert!(error.contains("does_not_exist"), "{}", error);
        assert_eq!(te.backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_play_clears_last_error() {
        let te = start_engine(0.25);
        assert!(!te.manager.play_track("nope", true).await);
        assert!(te.manager.last_error().await.is_some());

        assert!(te.manager.play_track("white_noise", true).await);
        assert!(te.manager.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_play_leaves_engine_idle() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("rain_gentle", true).await);
        te.backend.fail_loads_matching("white_noise");

        assert!(!te.manager.play_track("white_noise", true).await);
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.manager.current_track().await.is_none());
        assert!(te.backend.active_handles().is_empty());
        assert!(te.manager.last_error().await.unwrap().contains("Playback error"));
    }

    #[tokio::test]
    async fn test_rendered_file_is_reused() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("rain_gentle", true).await);
        assert!(te.manager.play_track("rain_gentle", true).await);
        assert!(te.manager.play_track("sleep_sounds", true).await);

        assert_eq!(te.generator.calls(), 1);
        assert_eq!(te.backend.load_count(), 3);
        assert!(te.dir.path().join("audio_gen").join("rain_gentle.wav").exists());
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("brown_noise", true).await);
        let handle = te.backend.active_handles()[0];

        te.manager.pause().await;
        assert_eq!(te.manager.state().await, SessionState::Paused);
        assert!(!te.manager.is_playing().await);
        assert_eq!(te.backend.is_paused(handle), Some(true));

        // A second pause is a no-op.
        te.manager.pause().await;
        let pauses = te.backend.calls().iter().filter(|c| matches!(c, BackendCall::Pause(_))).count();
        assert_eq!(pauses, 1);

        te.manager.resume().await;
        assert!(te.manager.is_playing().await);
        assert_eq!(te.backend.is_paused(handle), Some(false));
    }

    #[tokio::test]
    async fn test_controls_without_session_are_noops() {
        let te = start_engine(0.25);
        te.manager.pause().await;
        te.manager.resume().await;
        te.manager.stop().await;
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.manager.last_error().await.is_none());
        assert!(te.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_releases_everything() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("campfire", true).await);
        te.manager.pause().await;
        te.manager.stop().await;

        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.manager.current_track().await.is_none());
        assert!(te.backend.active_handles().is_empty());
        assert_eq!(te.backend.unload_count(), 1);

        te.manager.stop().await;
        assert_eq!(te.backend.unload_count(), 1);
    }

    #[tokio::test]
    async fn test_volume_is_clamped_and_applied() {
        let te = start_engine(0.25);
        assert!(approx_eq(te.manager.volume().await, 0.7));

        assert!(te.manager.play_track("white_noise", true).await);
        let handle = te.backend.active_handles()[0];
        assert!(approx_eq(te.backend.volume_of(handle).unwrap(), 0.7));

        te.manager.set_volume(0.4).await;
        assert!(approx_eq(te.manager.volume().await, 0.4));
        assert!(approx_eq(te.backend.volume_of(handle).unwrap(), 0.4));

        te.manager.set_volume(1.5).await;
        assert_eq!(te.manager.volume().await, 1.0);
        te.manager.set_volume(-0.3).await;
        assert_eq!(te.manager.volume().await, 0.0);
        te.manager.set_volume(f32::NAN).await;
        assert_eq!(te.manager.volume().await, 0.0);
    }

    #[tokio::test]
    async fn test_volume_persists_across_sessions() {
        let te = start_engine(0.25);
        te.manager.set_volume(0.25).await;
        assert!(te.manager.play_track("ocean_waves", true).await);
        let handle = te.backend.active_handles()[0];
        assert!(approx_eq(te.backend.volume_of(handle).unwrap(), 0.25));
    }

    #[tokio::test]
    async fn test_natural_finish_returns_to_idle() {
        let te = start_engine(0.2);
        let mut events = te.manager.subscribe();
        assert!(te.manager.play_track("white_noise", false).await);

        let finished = wait_for_event(&mut events, Duration::from_secs(5), |e| matches!(e, EngineEvent::Finished { .. })).await;
        assert_eq!(finished, Some(EngineEvent::Finished { target_id: "white_noise".to_string() }));
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.backend.active_handles().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_recorded() {
        let te = start_engine(0.25);
        let mut events = te.manager.subscribe();
        assert!(te.manager.play_track("thunderstorm", true).await);
        let handle = te.backend.active_handles()[0];

        assert!(te.backend.inject_failure(handle, "decoder exploded"));
        let error = wait_for_event(&mut events, Duration::from_secs(5), |e| matches!(e, EngineEvent::Error(_))).await;
        assert!(error.is_some());

        let last_error = te.manager.last_error().await.unwrap();
        assert!(last_error.contains("decoder exploded"), "{}", last_error);
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.backend.active_handles().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_engine() -> Result<(), Box<dyn Error>> {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("rain_gentle", true).await);

        te.manager.shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), te.task).await??;
        assert!(te.backend.active_handles().is_empty());

        assert!(!te.manager.play_track("rain_gentle", true).await);
        assert!(!te.manager.is_playing().await);
        assert_eq!(te.manager.last_error().await.as_deref(), Some("Audio engine is not running"));
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_exits_when_handles_dropped() -> Result<(), Box<dyn Error>> {
        let te = start_engine(0.25);
        let clone = te.manager.clone();
        assert!(clone.play_track("ocean_waves", true).await);

        drop(clone);
        drop(te.manager);
        tokio::time::timeout(Duration::from_secs(5), te.task).await??;
        assert!(te.backend.active_handles().is_empty());
        Ok(())
    }
}
