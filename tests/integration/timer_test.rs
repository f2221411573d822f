//! Integration tests for timed playback
//!
//! These run on a paused clock so minute-long timers elapse instantly.

use crate::test_utils::{start_engine, wait_for_event};
use soundscape_engine::audio::BackendCall;
use soundscape_engine::player::{EngineEvent, SessionState};
use std::time::Duration;
use tokio::time::sleep;

#[cfg(test)]
mod timer_integration_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_playback() {
        let te = start_engine(0.25);
        let mut events = te.manager.subscribe();
        assert!(te.manager.play_with_timer("rain_gentle", 1.0).await);

        sleep(Duration::from_secs(30)).await;
        assert!(te.manager.is_playing().await);

        let elapsed = wait_for_event(&mut events, Duration::from_secs(120), |e| matches!(e, EngineEvent::TimerElapsed { .. })).await;
        assert_eq!(elapsed, Some(EngineEvent::TimerElapsed { target_id: "rain_gentle".to_string() }));
        assert_eq!(te.manager.state().await, SessionState::Idle);
        assert!(te.backend.active_handles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_playback_loops() {
        let te = start_engine(0.25);
        assert!(te.manager.play_with_timer("sleep_sounds", 10.0).await);
        assert!(matches!(te.backend.calls().first(), Some(BackendCall::Load { looping: true, .. })));
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("rain_gentle".to_string()));

        // Far past the rendered body, still playing.
        sleep(Duration::from_secs(120)).await;
        assert!(te.manager.is_playing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let te = start_engine(0.25);
        assert!(te.manager.play_with_timer("white_noise", 1.0).await);
        te.manager.stop().await;
        assert!(te.manager.play_track("ocean_waves", true).await);

        sleep(Duration::from_secs(180)).await;
        assert!(te.manager.is_playing().await);
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("ocean_waves".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_timer_supersedes_older() {
        let te = start_engine(0.25);
        assert!(te.manager.play_with_timer("white_noise", 1.0).await);
        assert!(te.manager.play_with_timer("brown_noise", 5.0).await);

        sleep(Duration::from_secs(120)).await;
        assert!(te.manager.is_playing().await);
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("brown_noise".to_string()));

        sleep(Duration::from_secs(240)).await;
        assert_eq!(te.manager.state().await, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_session_still_times_out() {
        let te = start_engine(0.25);
        assert!(te.manager.play_with_timer("campfire", 2.0).await);
        te.manager.pause().await;

        sleep(Duration::from_secs(150)).await;
        assert_eq!(te.manager.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_durations_are_rejected() {
        let te = start_engine(0.25);
        for minutes in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(!te.manager.play_with_timer("rain_gentle", minutes).await);
            assert!(te.manager.last_error().await.unwrap().contains("Timer"));
        }
        assert_eq!(te.backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_durations_keep_current_session() {
        let te = start_engine(0.25);
        assert!(te.manager.play_track("ocean_waves", true).await);
        for minutes in [1e300, f64::MAX] {
            assert!(!te.manager.play_with_timer("rain_gentle", minutes).await);
            assert!(te.manager.last_error().await.unwrap().contains("Timer"));
        }
        assert_eq!(te.backend.load_count(), 1);
        assert!(te.manager.is_playing().await);
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("ocean_waves".to_string()));

        assert!(te.manager.play_with_timer("rain_gentle", 1.0).await);
        assert_eq!(te.manager.current_track().await.map(|t| t.id().to_string()), Some("rain_gentle".to_string()));
    }

    #[tokio::test]
    async fn test_timer_with_unknown_track_fails() {
        let te = start_engine(0.25);
        assert!(!te.manager.play_with_timer("nowhere", 1.0).await);
        assert!(te.manager.last_error().await.unwrap().contains("nowhere"));
        assert_eq!(te.manager.state().await, SessionState::Idle);
    }
}
