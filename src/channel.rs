use crate::track::TrackRef;
use std::fmt;

/// Identifies one asynchronous playback start. Completion reports carry the
/// ticket back so superseded starts can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The output refused to start until the user interacts.
    #[error("playback blocked: {0}")]
    Blocked(String),
    /// The track could not be opened or decoded.
    #[error("playback resource error: {0}")]
    Resource(String),
}

/// One playback slot. Implementations must not block: `start` kicks off
/// playback and the outcome is reported later with the same ticket.
pub trait AudioChannel {
    fn assign(&mut self, track: &TrackRef);
    fn track(&self) -> Option<&TrackRef>;
    fn set_looping(&mut self, looping: bool);
    fn rewind(&mut self);
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn start(&mut self, ticket: PlayTicket);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    fn is_playing(&self, track_name: &str) -> bool {
        !self.is_paused() && self.track().is_some_and(|t| t.name() == track_name)
    }
}

/// The output device as a whole. Starts suspended; `resume` brings it up
/// (building it first if needed).
pub trait AudioContext {
    fn is_suspended(&self) -> bool;
    fn resume(&mut self) -> anyhow::Result<()>;
}
