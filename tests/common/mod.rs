#![allow(dead_code)]

use stage_music::channel::{AudioChannel, AudioContext, PlayTicket};
use stage_music::crossfade::MusicController;
use stage_music::fade::DEFAULT_FADE;
use stage_music::track::{DEFAULT_TRACK, TrackCatalog, TrackRef};

/// In-memory channel that records every start it is asked for.
#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub track: Option<TrackRef>,
    pub volume: f32,
    pub paused: bool,
    pub looping: bool,
    pub rewinds: u32,
    pub starts: Vec<PlayTicket>,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            track: None,
            volume: 0.0,
            paused: true,
            looping: false,
            rewinds: 0,
            starts: Vec::new(),
        }
    }
}

impl AudioChannel for FakeChannel {
    fn assign(&mut self, track: &TrackRef) {
        self.track = Some(track.clone());
    }

    fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn rewind(&mut self) {
        self.rewinds += 1;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn start(&mut self, ticket: PlayTicket) {
        self.starts.push(ticket);
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Output context whose next `failures` resumes are refused.
#[derive(Debug, Clone)]
pub struct FakeContext {
    pub suspended: bool,
    pub failures: u32,
    pub resumes: u32,
}

impl Default for FakeContext {
    fn default() -> Self {
        Self {
            suspended: true,
            failures: 0,
            resumes: 0,
        }
    }
}

impl AudioContext for FakeContext {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        self.resumes += 1;
        if self.failures > 0 {
            self.failures -= 1;
            anyhow::bail!("output refused to start");
        }
        self.suspended = false;
        Ok(())
    }
}

pub type FakeController = MusicController<FakeChannel, FakeContext>;

pub fn controller() -> FakeController {
    MusicController::new(
        TrackCatalog::builtin("sounds"),
        FakeContext::default(),
        FakeChannel::default(),
        FakeChannel::default(),
        0.6,
        DEFAULT_FADE,
    )
    .with_selected(Some(DEFAULT_TRACK.to_string()))
}
