//! Two-channel music crossfader with an unlock gate in front of it.
//!
//! Nothing here blocks or sleeps. Playback starts are reported back through
//! [`MusicController::playback_started`] / [`MusicController::playback_failed`],
//! and fades advance through [`MusicController::advance`] driven by the
//! console's frame loop.

use crate::channel::{AudioChannel, AudioContext, ChannelId, PlayTicket, PlaybackError};
use crate::fade::{FADE_TICK, FadeState};
use crate::gate::UnlockGate;
use crate::track::TrackCatalog;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const UNLOCK_PROMPT: &str = "Press any key to enable audio";

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub track: String,
    pub target_volume: f32,
    pub fade: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MusicState {
    Idle,
    WaitingForUnlock,
    Starting {
        track: String,
    },
    Fading {
        from: ChannelId,
        to: ChannelId,
        track: String,
        progress: f32,
    },
    Playing {
        track: String,
    },
    Paused,
}

impl MusicState {
    pub fn status_line(&self) -> String {
        match self {
            Self::Idle => "Music idle".to_string(),
            Self::WaitingForUnlock => UNLOCK_PROMPT.to_string(),
            Self::Starting { track } => format!("Loading: {track}"),
            Self::Fading { track, .. } | Self::Playing { track } => format!("Playing: {track}"),
            Self::Paused => "Music paused (applause)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    AlreadyOpen,
    Opened,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeOutcome {
    /// Gate closed; kept as the pending request.
    Deferred,
    /// Track already audible (or already on its way in); nothing restarted.
    Unchanged,
    /// Incoming channel asked to start; the fade begins once it reports back.
    Started(PlayTicket),
    /// Unknown track.
    Rejected,
}

#[derive(Debug, Clone)]
struct StartingPlayback {
    ticket: PlayTicket,
    channel: ChannelId,
    request: PendingRequest,
}

pub struct MusicController<C, X> {
    catalog: TrackCatalog,
    context: X,
    channels: [C; 2],
    active: ChannelId,
    gate: UnlockGate<PendingRequest>,
    starting: Option<StartingPlayback>,
    fade: Option<FadeState>,
    state: MusicState,
    volume: f32,
    default_fade: Duration,
    selected: Option<String>,
    next_ticket: u64,
    tick_debt: Duration,
}

impl<C: AudioChannel, X: AudioContext> MusicController<C, X> {
    pub fn new(
        catalog: TrackCatalog,
        context: X,
        a: C,
        b: C,
        volume: f32,
        default_fade: Duration,
    ) -> Self {
        Self {
            catalog,
            context,
            channels: [a, b],
            active: ChannelId::A,
            gate: UnlockGate::new(),
            starting: None,
            fade: None,
            state: MusicState::Idle,
            volume: sanitize_volume(volume).unwrap_or(0.0),
            default_fade,
            selected: None,
            next_ticket: 1,
            tick_debt: Duration::ZERO,
        }
    }

    pub fn with_selected(mut self, track: Option<String>) -> Self {
        self.selected = track;
        self
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn context(&self) -> &X {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut X {
        &mut self.context
    }

    pub fn channel(&self, id: ChannelId) -> &C {
        match id {
            ChannelId::A => &self.channels[0],
            ChannelId::B => &self.channels[1],
        }
    }

    fn channel_mut(&mut self, id: ChannelId) -> &mut C {
        match id {
            ChannelId::A => &mut self.channels[0],
            ChannelId::B => &mut self.channels[1],
        }
    }

    pub fn active_channel(&self) -> ChannelId {
        self.active
    }

    pub fn state(&self) -> &MusicState {
        &self.state
    }

    pub fn status_line(&self) -> String {
        self.state.status_line()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn selected_track(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_unlocked(&self) -> bool {
        self.gate.is_open()
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.gate.pending()
    }

    pub fn fade(&self) -> Option<&FadeState> {
        self.fade.as_ref()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn starting_ticket(&self) -> Option<PlayTicket> {
        self.starting.as_ref().map(|s| s.ticket)
    }

    /// Called on every key press or click. Opens the gate once the output
    /// resumes; a failed resume leaves the gate closed for the next attempt.
    pub fn request_unlock(&mut self) -> UnlockOutcome {
        if self.gate.is_open() {
            return UnlockOutcome::AlreadyOpen;
        }
        if let Err(err) = self.context.resume() {
            warn!(error = %err, "audio unlock failed; retrying on next interaction");
            return UnlockOutcome::Failed;
        }

        let pending = self.gate.open().flatten();
        info!(pending = pending.is_some(), "audio unlocked");
        match pending {
            Some(req) => {
                self.crossfade_to(&req.track, Some(req.target_volume), Some(req.fade));
            }
            None => {
                if self.state == MusicState::WaitingForUnlock {
                    self.state = MusicState::Idle;
                }
            }
        }
        UnlockOutcome::Opened
    }

    /// Same as [`crossfade_to`](Self::crossfade_to) with the configured volume and fade length.
    pub fn play(&mut self, track: &str) -> CrossfadeOutcome {
        self.crossfade_to(track, None, None)
    }

    pub fn crossfade_to(
        &mut self,
        track: &str,
        target_volume: Option<f32>,
        fade: Option<Duration>,
    ) -> CrossfadeOutcome {
        let track_ref = match self.catalog.resolve(track) {
            Ok(t) => t,
            Err(err) => {
                warn!(error = %err, "crossfade request ignored");
                return CrossfadeOutcome::Rejected;
            }
        };
        let request = PendingRequest {
            track: track.to_string(),
            target_volume: target_volume
                .and_then(sanitize_volume)
                .unwrap_or(self.volume),
            fade: fade.unwrap_or(self.default_fade),
        };

        if !self.gate.is_open() {
            self.selected = Some(request.track.clone());
            if let Ok(Some(replaced)) = self.gate.defer(request) {
                debug!(replaced = %replaced.track, "pending music request replaced");
            }
            debug!(track, "music request deferred until unlock");
            self.state = MusicState::WaitingForUnlock;
            return CrossfadeOutcome::Deferred;
        }

        if self.context.is_suspended() {
            if let Err(err) = self.context.resume() {
                warn!(error = %err, "failed to resume audio output");
            }
        }

        if self.retarget_in_flight(track, request.target_volume) {
            debug!(track, "track already on its way in");
            return CrossfadeOutcome::Unchanged;
        }

        if self.channel(self.active).is_playing(track) {
            self.cancel_transition();
            let active = self.active;
            self.channel_mut(active).set_volume(request.target_volume);
            self.selected = Some(request.track.clone());
            self.state = MusicState::Playing {
                track: request.track,
            };
            return CrossfadeOutcome::Unchanged;
        }

        self.cancel_transition();

        let incoming = self.active.other();
        let ticket = PlayTicket(self.next_ticket);
        self.next_ticket += 1;
        {
            let ch = self.channel_mut(incoming);
            ch.assign(&track_ref);
            ch.set_looping(true);
            ch.rewind();
            ch.set_volume(0.0);
            ch.start(ticket);
        }
        debug!(track, channel = %incoming, ticket = ticket.0, "starting incoming channel");
        self.state = MusicState::Starting {
            track: request.track.clone(),
        };
        self.starting = Some(StartingPlayback {
            ticket,
            channel: incoming,
            request,
        });
        CrossfadeOutcome::Started(ticket)
    }

    /// The incoming channel is playing; begin the fade. Returns `false` for a
    /// superseded ticket.
    pub fn playback_started(&mut self, ticket: PlayTicket) -> bool {
        let Some(start) = self.starting.take_if(|s| s.ticket == ticket) else {
            debug!(ticket = ticket.0, "ignoring stale playback start");
            return false;
        };

        let from = self.active;
        let to = start.channel;
        let track = start.request.track;
        let fade = FadeState::new(
            from,
            to,
            track.clone(),
            start.request.target_volume,
            start.request.fade,
        );
        info!(%track, %from, %to, steps = fade.steps(), "crossfade started");

        self.selected = Some(track.clone());
        self.state = MusicState::Fading {
            from,
            to,
            track,
            progress: 0.0,
        };
        self.fade = Some(fade);
        self.tick_debt = Duration::ZERO;
        true
    }

    /// The incoming channel could not start. Nothing is left half-assigned:
    /// the incoming channel is silenced and the active marker never moves.
    pub fn playback_failed(&mut self, ticket: PlayTicket, err: PlaybackError) -> bool {
        let Some(start) = self.starting.take_if(|s| s.ticket == ticket) else {
            debug!(ticket = ticket.0, "ignoring stale playback failure");
            return false;
        };
        self.silence(start.channel);

        match err {
            PlaybackError::Blocked(reason) => {
                warn!(
                    track = %start.request.track,
                    %reason,
                    "playback blocked; waiting for interaction"
                );
                self.gate.relock(start.request);
                self.state = MusicState::WaitingForUnlock;
            }
            PlaybackError::Resource(reason) => {
                warn!(track = %start.request.track, %reason, "track could not be played");
                self.state = self.settled_state();
            }
        }
        true
    }

    /// Runs one fade tick. Returns `false` when no fade is in progress.
    pub fn tick(&mut self) -> bool {
        let Some(mut fade) = self.fade.take() else {
            return false;
        };
        let (from, to) = (fade.from(), fade.to());
        let step = fade.step(self.channel(to).volume(), self.channel(from).volume());
        self.channel_mut(to).set_volume(step.incoming);
        self.channel_mut(from).set_volume(step.outgoing);

        if step.finished {
            {
                let old = self.channel_mut(from);
                old.pause();
                old.rewind();
            }
            self.active = to;
            info!(track = fade.track(), active = %to, "crossfade finished");
            self.state = MusicState::Playing {
                track: fade.track().to_string(),
            };
        } else {
            self.state = MusicState::Fading {
                from,
                to,
                track: fade.track().to_string(),
                progress: fade.progress(),
            };
            self.fade = Some(fade);
        }
        true
    }

    /// Runs the fade ticks owed for `dt` of wall time.
    pub fn advance(&mut self, dt: Duration) {
        if self.fade.is_none() {
            self.tick_debt = Duration::ZERO;
            return;
        }
        self.tick_debt += dt;
        while self.tick_debt >= FADE_TICK && self.tick() {
            self.tick_debt -= FADE_TICK;
        }
        if self.fade.is_none() {
            self.tick_debt = Duration::ZERO;
        }
    }

    /// Sets the configured volume. An audible active channel follows at once;
    /// during a fade the incoming ramp is also re-aimed at the new level.
    pub fn set_volume(&mut self, level: f32) {
        let Some(level) = sanitize_volume(level) else {
            return;
        };
        self.volume = level;
        if let Some(start) = self.starting.as_mut() {
            start.request.target_volume = level;
        }
        if let Some(to) = self.fade.as_ref().map(|f| f.to()) {
            self.retarget_fade(to, level);
        }

        let active = self.active;
        let ch = self.channel_mut(active);
        if !ch.is_paused() {
            ch.set_volume(level);
        }
    }

    /// Stops both channels in place (used while the applause plays).
    pub fn pause_all(&mut self) {
        self.cancel_transition();
        for ch in &mut self.channels {
            ch.pause();
        }
        self.state = MusicState::Paused;
    }

    /// Points a start or fade already bringing in `track` at `target`.
    /// Returns `false` when `track` is not in flight.
    fn retarget_in_flight(&mut self, track: &str, target: f32) -> bool {
        if let Some(start) = self.starting.as_mut() {
            if start.request.track == track {
                start.request.target_volume = target;
                return true;
            }
            return false;
        }
        match self.fade.as_ref().map(|f| (f.to(), f.track() == track)) {
            Some((to, true)) => {
                self.retarget_fade(to, target);
                true
            }
            _ => false,
        }
    }

    fn retarget_fade(&mut self, to: ChannelId, target: f32) {
        let incoming = self.channel(to).volume();
        if let Some(fade) = self.fade.as_mut() {
            fade.retarget(target, incoming);
        }
    }

    fn cancel_transition(&mut self) {
        if let Some(start) = self.starting.take() {
            debug!(ticket = start.ticket.0, "superseding pending playback start");
        }
        if let Some(fade) = self.fade.take() {
            debug!(track = fade.track(), progress = fade.progress(), "crossfade cancelled");
        }
        self.tick_debt = Duration::ZERO;
        let incoming = self.active.other();
        self.silence(incoming);
    }

    fn silence(&mut self, id: ChannelId) {
        let ch = self.channel_mut(id);
        ch.pause();
        ch.set_volume(0.0);
    }

    fn settled_state(&self) -> MusicState {
        let active = self.channel(self.active);
        match active.track() {
            Some(t) if !active.is_paused() => MusicState::Playing {
                track: t.name().to_string(),
            },
            _ => MusicState::Idle,
        }
    }
}

fn sanitize_volume(v: f32) -> Option<f32> {
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}
