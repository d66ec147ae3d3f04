use crate::channel::{AudioChannel, AudioContext, PlayTicket, PlaybackError};
use crate::clips::ClipLibrary;
use crate::crossfade::{CrossfadeOutcome, MusicController, UnlockOutcome};
use crate::mapper::TrackMap;
use crate::track::TrackRef;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const APPLAUSE_DURATION: Duration = Duration::from_secs(6);
pub const PARTICLE_INTERVAL: Duration = Duration::from_millis(200);
pub const PARTICLE_LIFETIME: Duration = Duration::from_millis(1500);

// Applause tickets live in the upper half so they never collide with music tickets.
const APPLAUSE_TICKET_BASE: u64 = 1 << 63;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: u64,
    /// Horizontal position as a fraction of the screen width, in [0.1, 0.9).
    pub column: f32,
    pub age: Duration,
}

#[derive(Debug, Clone)]
struct Applause {
    elapsed: Duration,
    since_spawn: Duration,
    ticket: Option<PlayTicket>,
}

/// Ties clip selection, the music crossfader and the applause effect together.
pub struct Show<C, X> {
    music: MusicController<C, X>,
    clips: ClipLibrary,
    track_map: TrackMap,
    applause_channel: C,
    applause_track: Option<TrackRef>,
    applause: Option<Applause>,
    applause_duration: Duration,
    next_applause_ticket: u64,
    particles: Vec<Particle>,
    next_particle: u64,
    selected_clip: Option<String>,
    current_clip: Option<String>,
    clip_status: String,
}

impl<C: AudioChannel, X: AudioContext> Show<C, X> {
    pub fn new(
        music: MusicController<C, X>,
        clips: ClipLibrary,
        track_map: TrackMap,
        applause_channel: C,
        applause_track: Option<TrackRef>,
    ) -> Self {
        let clip_status = if clips.is_empty() {
            "No animations found".to_string()
        } else {
            String::new()
        };
        Self {
            music,
            clips,
            track_map,
            applause_channel,
            applause_track,
            applause: None,
            applause_duration: APPLAUSE_DURATION,
            next_applause_ticket: APPLAUSE_TICKET_BASE,
            particles: Vec::new(),
            next_particle: 0,
            selected_clip: None,
            current_clip: None,
            clip_status,
        }
    }

    pub fn with_applause_duration(mut self, duration: Duration) -> Self {
        self.applause_duration = duration;
        self
    }

    pub fn with_clip_status(mut self, status: impl Into<String>) -> Self {
        self.clip_status = status.into();
        self
    }

    pub fn music(&self) -> &MusicController<C, X> {
        &self.music
    }

    pub fn music_mut(&mut self) -> &mut MusicController<C, X> {
        &mut self.music
    }

    pub fn clips(&self) -> &ClipLibrary {
        &self.clips
    }

    pub fn track_map(&self) -> &TrackMap {
        &self.track_map
    }

    pub fn applause_channel(&self) -> &C {
        &self.applause_channel
    }

    pub fn selected_clip(&self) -> Option<&str> {
        self.selected_clip.as_deref()
    }

    pub fn current_clip(&self) -> Option<&str> {
        self.current_clip.as_deref()
    }

    pub fn clip_status(&self) -> &str {
        &self.clip_status
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn is_applauding(&self) -> bool {
        self.applause.is_some()
    }

    /// Plays the opening clip; its music stays queued until audio is unlocked.
    pub fn start(&mut self) -> bool {
        match self.clips.opener().map(str::to_string) {
            Some(clip) => self.play_clip(&clip),
            None => false,
        }
    }

    pub fn interact(&mut self) -> UnlockOutcome {
        self.music.request_unlock()
    }

    pub fn play_clip(&mut self, name: &str) -> bool {
        if self.is_applauding() {
            debug!(clip = name, "clip change ignored during applause");
            return false;
        }
        if !self.clips.contains(name) {
            warn!(clip = name, "cannot play unknown clip");
            return false;
        }
        self.selected_clip = Some(name.to_string());
        self.current_clip = Some(name.to_string());

        let track = self
            .track_map
            .map_clip_to_track(name, self.music.selected_track())
            .to_string();
        info!(clip = name, %track, "clip started");
        self.music.play(&track);
        true
    }

    pub fn stop_clip(&mut self) {
        self.current_clip = None;
    }

    pub fn next_clip(&mut self) -> bool {
        self.step_clip(true)
    }

    pub fn prev_clip(&mut self) -> bool {
        self.step_clip(false)
    }

    fn step_clip(&mut self, forward: bool) -> bool {
        if self.is_applauding() {
            return false;
        }
        let Some(next) = self
            .clips
            .step_from(self.selected_clip.as_deref(), forward)
            .map(str::to_string)
        else {
            return false;
        };
        self.play_clip(&next)
    }

    pub fn select_music(&mut self, track: &str) -> CrossfadeOutcome {
        self.music.play(track)
    }

    pub fn step_music(&mut self, forward: bool) -> CrossfadeOutcome {
        let Some(next) = self
            .music
            .catalog()
            .step_from(self.music.selected_track(), forward)
            .map(str::to_string)
        else {
            return CrossfadeOutcome::Rejected;
        };
        self.music.play(&next)
    }

    pub fn set_volume(&mut self, level: f32) {
        self.music.set_volume(level);
    }

    pub fn nudge_volume(&mut self, delta: f32) {
        let level = self.music.volume() + delta;
        self.music.set_volume(level);
    }

    pub fn trigger_applause(&mut self) -> bool {
        if self.is_applauding() {
            return false;
        }
        info!("applause started");
        self.stop_clip();
        self.music.pause_all();

        let ticket = match self.applause_track.as_ref() {
            Some(track) => {
                let ticket = PlayTicket(self.next_applause_ticket);
                self.next_applause_ticket += 1;
                let ch = &mut self.applause_channel;
                ch.assign(track);
                ch.set_looping(false);
                ch.rewind();
                ch.set_volume(1.0);
                ch.start(ticket);
                Some(ticket)
            }
            None => None,
        };

        self.applause = Some(Applause {
            elapsed: Duration::ZERO,
            since_spawn: Duration::ZERO,
            ticket,
        });
        true
    }

    pub fn advance(&mut self, dt: Duration) {
        self.music.advance(dt);

        for p in &mut self.particles {
            p.age += dt;
        }
        self.particles.retain(|p| p.age < PARTICLE_LIFETIME);

        let Some(applause) = self.applause.as_mut() else {
            return;
        };
        applause.elapsed += dt;
        applause.since_spawn += dt;
        let mut spawn = 0usize;
        while applause.since_spawn >= PARTICLE_INTERVAL {
            applause.since_spawn -= PARTICLE_INTERVAL;
            spawn += 1;
        }
        let finished = applause.elapsed >= self.applause_duration;

        for _ in 0..spawn {
            self.spawn_particle();
        }
        if finished {
            self.finish_applause();
        }
    }

    fn spawn_particle(&mut self) {
        let id = self.next_particle;
        self.next_particle += 1;
        self.particles.push(Particle {
            id,
            column: fastrand::f32() * 0.8 + 0.1,
            age: Duration::ZERO,
        });
    }

    fn finish_applause(&mut self) {
        self.applause = None;
        self.particles.clear();
        self.applause_channel.pause();
        info!("applause finished");

        let resume = self
            .selected_clip
            .clone()
            .or_else(|| self.clips.first().map(str::to_string));
        if let Some(clip) = resume {
            self.play_clip(&clip);
        }
    }

    pub fn playback_started(&mut self, ticket: PlayTicket) -> bool {
        if self.is_applause_ticket(ticket) {
            debug!(ticket = ticket.0, "applause playing");
            return true;
        }
        self.music.playback_started(ticket)
    }

    pub fn playback_failed(&mut self, ticket: PlayTicket, err: PlaybackError) -> bool {
        if self.is_applause_ticket(ticket) {
            warn!(error = %err, "applause sound could not play");
            return true;
        }
        self.music.playback_failed(ticket, err)
    }

    fn is_applause_ticket(&self, ticket: PlayTicket) -> bool {
        ticket.0 >= APPLAUSE_TICKET_BASE
    }

    pub fn applause_ticket(&self) -> Option<PlayTicket> {
        self.applause.as_ref().and_then(|a| a.ticket)
    }
}
