use super::state::EngineCommand;
use super::{command_handler, AudioEngine, LOG_TARGET};
use tracing::{info, trace};

/// Runs the engine's command processing loop.
pub async fn run_engine_loop(engine: &mut AudioEngine) {
    info!(target: LOG_TARGET, "Engine run loop started.");

    loop {
        tokio::select! {
            biased; // Commands first

            command = engine.command_rx.recv() => {
                let Some(command) = command else {
                    info!(target: LOG_TARGET, "All engine handles dropped. Exiting run loop.");
                    break;
                };
                trace!(target: LOG_TARGET, "Received command: {:?}", command);
                match command {
                    EngineCommand::PlayTrack { track_id, looping, respond } => {
                        let ok = command_handler::handle_play_track(engine, &track_id, looping).await;
                        let _ = respond.send(ok);
                    }
                    EngineCommand::PlaySoundscape { soundscape_id, looping, respond } => {
                        let ok = command_handler::handle_play_soundscape(engine, &soundscape_id, looping).await;
                        let _ = respond.send(ok);
                    }
                    EngineCommand::PlayWithTimer { track_id, minutes, respond } => {
                        let ok = command_handler::handle_play_with_timer(engine, &track_id, minutes).await;
                        let _ = respond.send(ok);
                    }
                    EngineCommand::Pause(respond) => {
                        command_handler::handle_pause(engine).await;
                        let _ = respond.send(());
                    }
                    EngineCommand::Resume(respond) => {
                        command_handler::handle_resume(engine).await;
                        let _ = respond.send(());
                    }
                    EngineCommand::Stop(respond) => {
                        command_handler::handle_stop(engine).await;
                        let _ = respond.send(());
                    }
                    EngineCommand::SetVolume { volume, respond } => {
                        let applied = command_handler::handle_set_volume(engine, volume).await;
                        let _ = respond.send(applied);
                    }
                    EngineCommand::GetSnapshot(respond) => {
                        let _ = respond.send(engine.snapshot());
                    }
                    EngineCommand::Shutdown(respond) => {
                        info!(target: LOG_TARGET, "Shutdown command received. Exiting run loop.");
                        command_handler::stop_session(engine).await;
                        let _ = respond.send(());
                        break;
                    }
                }
            }

            Some(status) = engine.status_rx.recv() => {
                trace!(target: LOG_TARGET, "Backend status: {:?}", status);
                command_handler::handle_backend_status(engine, status).await;
            }

            Some(session_id) = engine.timer_rx.recv() => {
                command_handler::handle_timer_elapsed(engine, session_id).await;
            }
        }
    }

    // Final cleanup when the loop exits without Shutdown.
    if engine.session.is_some() {
        command_handler::stop_session(engine).await;
    }
    info!(target: LOG_TARGET, "Engine run loop finished.");
}
