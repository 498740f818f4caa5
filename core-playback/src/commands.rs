//! Media command table for hardware keys and OS media controls.
//!
//! The platform layer registers [`MediaCommand::ALL`] once and routes every
//! callback through [`MediaCommandHandler::dispatch`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::engine::PlaybackEngine;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MediaCommand {
    Play,
    Pause,
    Next,
    Previous,
    SeekTo { position_ms: u64 },
    Stop,
}

impl MediaCommand {
    /// Command names to register with the platform.
    pub const ALL: [&'static str; 6] = [
        "play",
        "pause",
        "nexttrack",
        "previoustrack",
        "seekto",
        "stop",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MediaCommand::Play => "play",
            MediaCommand::Pause => "pause",
            MediaCommand::Next => "nexttrack",
            MediaCommand::Previous => "previoustrack",
            MediaCommand::SeekTo { .. } => "seekto",
            MediaCommand::Stop => "stop",
        }
    }

    pub fn seek_to(position: Duration) -> Self {
        MediaCommand::SeekTo {
            position_ms: position.as_millis() as u64,
        }
    }
}

#[derive(Clone)]
pub struct MediaCommandHandler {
    engine: Arc<PlaybackEngine>,
}

impl MediaCommandHandler {
    pub(crate) fn new(engine: Arc<PlaybackEngine>) -> Self {
        Self { engine }
    }

    pub async fn dispatch(&self, command: MediaCommand) -> Result<()> {
        debug!(command = command.name(), "Media command");
        match command {
            MediaCommand::Play => self.engine.play().await,
            MediaCommand::Pause => self.engine.pause().await,
            MediaCommand::Next => {
                self.engine.next().await;
                Ok(())
            }
            MediaCommand::Previous => {
                self.engine.previous().await;
                Ok(())
            }
            MediaCommand::SeekTo { position_ms } => {
                self.engine
                    .seek(Duration::from_millis(position_ms))
                    .await
            }
            MediaCommand::Stop => self.engine.stop().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_are_registered() {
        let commands = [
            MediaCommand::Play,
            MediaCommand::Pause,
            MediaCommand::Next,
            MediaCommand::Previous,
            MediaCommand::seek_to(Duration::from_secs(3)),
            MediaCommand::Stop,
        ];
        for command in commands {
            assert!(MediaCommand::ALL.contains(&command.name()));
        }
    }
}
