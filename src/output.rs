use crate::channel::{AudioChannel, AudioContext, PlayTicket, PlaybackError};
use crate::decode::{DecodeCache, Pcm, decode_file};
use crate::track::TrackRef;
use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

/// Music A, music B, applause.
pub const DECKS: usize = 3;

const COMMAND_CAPACITY: usize = 256;

pub fn list_output_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .context("enumerate output devices")?;

    let mut out = io::stdout();
    writeln!(out, "Output devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct Completion {
    pub ticket: PlayTicket,
    pub result: Result<(), PlaybackError>,
}

enum MixerCommand {
    Load { deck: usize, pcm: Arc<Pcm> },
    Play { deck: usize },
    Pause { deck: usize },
    Rewind { deck: usize },
    SetVolume { deck: usize, volume: f32 },
    SetLooping { deck: usize, looping: bool },
}

#[derive(Default)]
struct Deck {
    pcm: Option<Arc<Pcm>>,
    pos: f64,
    volume: f32,
    playing: bool,
    looping: bool,
}

struct Mixer {
    decks: [Deck; DECKS],
    commands: ringbuf::HeapCons<MixerCommand>,
    out_rate: u32,
    out_channels: usize,
    scratch: Vec<f32>,
}

impl Mixer {
    fn new(commands: ringbuf::HeapCons<MixerCommand>, out_rate: u32, out_channels: usize) -> Self {
        Self {
            decks: std::array::from_fn(|_| Deck::default()),
            commands,
            out_rate,
            out_channels: out_channels.max(1),
            scratch: Vec::new(),
        }
    }

    fn apply_commands(&mut self) {
        while let Some(cmd) = self.commands.try_pop() {
            match cmd {
                MixerCommand::Load { deck, pcm } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.pcm = Some(pcm);
                        d.pos = 0.0;
                    }
                }
                MixerCommand::Play { deck } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.playing = d.pcm.is_some();
                    }
                }
                MixerCommand::Pause { deck } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.playing = false;
                    }
                }
                MixerCommand::Rewind { deck } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.pos = 0.0;
                    }
                }
                MixerCommand::SetVolume { deck, volume } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.volume = volume.clamp(0.0, 1.0);
                    }
                }
                MixerCommand::SetLooping { deck, looping } => {
                    if let Some(d) = self.decks.get_mut(deck) {
                        d.looping = looping;
                    }
                }
            }
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        self.apply_commands();
        out.fill(0.0);
        let out_ch = self.out_channels;
        let out_rate = self.out_rate.max(1) as f64;

        for deck in &mut self.decks {
            if !deck.playing || deck.volume <= 0.0 {
                continue;
            }
            let Some(pcm) = deck.pcm.as_ref() else {
                continue;
            };
            let frames = pcm.frames();
            if frames == 0 {
                deck.playing = false;
                continue;
            }
            let step = pcm.sample_rate as f64 / out_rate;
            for frame in out.chunks_mut(out_ch) {
                let mut idx = deck.pos as usize;
                if idx >= frames {
                    if !deck.looping {
                        deck.playing = false;
                        break;
                    }
                    deck.pos %= frames as f64;
                    idx = deck.pos as usize;
                }
                for (c, s) in frame.iter_mut().enumerate() {
                    *s += pcm.sample(idx, c) * deck.volume;
                }
                deck.pos += step;
            }
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }

    fn render_into<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(data.len(), 0.0);
        self.render(&mut scratch);
        for (dst, src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(*src);
        }
        self.scratch = scratch;
    }
}

type CommandQueue = Arc<Mutex<ringbuf::HeapProd<MixerCommand>>>;

fn push_command(queue: &CommandQueue, cmd: MixerCommand) -> bool {
    let Ok(mut prod) = queue.lock() else {
        return false;
    };
    if prod.try_push(cmd).is_err() {
        warn!("mixer command queue full; dropping command");
        return false;
    }
    true
}

/// Queues `Load` + `Play` for `deck` only if `ticket` is still the deck's
/// live start. The check happens under the queue lock so a `pause` cannot
/// slip in between. `None` means the start was superseded.
fn queue_start(
    queue: &CommandQueue,
    live: &AtomicU64,
    ticket: PlayTicket,
    deck: usize,
    pcm: Arc<Pcm>,
) -> Option<Result<(), PlaybackError>> {
    let Ok(mut prod) = queue.lock() else {
        return Some(Err(PlaybackError::Resource("mixer queue unavailable".to_string())));
    };
    if live.load(Ordering::Acquire) != ticket.0 {
        return None;
    }
    if prod.vacant_len() < 2 {
        warn!(deck, "mixer command queue full; start dropped");
        return Some(Err(PlaybackError::Resource("mixer command queue full".to_string())));
    }
    let _ = prod.try_push(MixerCommand::Load { deck, pcm });
    let _ = prod.try_push(MixerCommand::Play { deck });
    Some(Ok(()))
}

/// The cpal output device. It is only opened on the first `resume`, which
/// happens when the listener first interacts with the console.
pub struct OutputContext {
    device_query: Option<String>,
    stream: Option<cpal::Stream>,
    commands: CommandQueue,
    ready: Arc<AtomicBool>,
    cache: Arc<DecodeCache>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    suspended: bool,
}

impl OutputContext {
    pub fn new(device_query: Option<&str>) -> Self {
        let (prod, _cons) = HeapRb::<MixerCommand>::new(COMMAND_CAPACITY).split();
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            device_query: device_query.map(str::to_string),
            stream: None,
            commands: Arc::new(Mutex::new(prod)),
            ready: Arc::new(AtomicBool::new(false)),
            cache: Arc::new(DecodeCache::new(DECKS)),
            completions_tx,
            completions_rx,
            suspended: true,
        }
    }

    /// A playback slot bound to mixer deck `deck`.
    pub fn channel(&self, deck: usize) -> OutputChannel {
        OutputChannel {
            deck,
            commands: Arc::clone(&self.commands),
            ready: Arc::clone(&self.ready),
            cache: Arc::clone(&self.cache),
            completions: self.completions_tx.clone(),
            live: Arc::new(AtomicU64::new(0)),
            track: None,
            volume: 0.0,
            paused: true,
        }
    }

    /// Playback starts that finished since the last call.
    pub fn drain_completions(&self) -> Vec<Completion> {
        self.completions_rx.try_iter().collect()
    }

    fn open_stream(&mut self) -> anyhow::Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = select_output_device(&host, self.device_query.as_deref())?;
        let supported = device
            .default_output_config()
            .context("get default output config")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        // Fresh queue per attempt; the consumer moves into the callback.
        let (prod, cons) = HeapRb::<MixerCommand>::new(COMMAND_CAPACITY).split();
        if let Ok(mut slot) = self.commands.lock() {
            *slot = prod;
        }
        let mut mixer = Mixer::new(cons, sample_rate, channels);

        let err_fn = |err| warn!("audio output stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _| mixer.render(data),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _| mixer.render_into(data),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_output_stream(
                &config,
                move |data: &mut [u16], _| mixer.render_into(data),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };
        info!(
            device = %device.name().unwrap_or_else(|_| "<unknown>".to_string()),
            sample_rate,
            channels,
            "audio output opened"
        );
        Ok(stream)
    }
}

impl AudioContext for OutputContext {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        if self.stream.is_none() {
            let stream = self.open_stream()?;
            self.stream = Some(stream);
        }
        if let Some(stream) = self.stream.as_ref() {
            stream.play().context("start output stream")?;
        }
        self.suspended = false;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

fn select_output_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let devices = host
        .output_devices()
        .context("enumerate output devices")?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no output device matching: {want}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device found"))
}

/// Control-side view of one mixer deck. Keeps its own copy of the state the
/// controller reads back, and forwards changes to the audio callback.
pub struct OutputChannel {
    deck: usize,
    commands: CommandQueue,
    ready: Arc<AtomicBool>,
    cache: Arc<DecodeCache>,
    completions: mpsc::Sender<Completion>,
    // Ticket of the start this deck is waiting on; 0 once paused.
    live: Arc<AtomicU64>,
    track: Option<TrackRef>,
    volume: f32,
    paused: bool,
}

impl OutputChannel {
    fn send(&self, cmd: MixerCommand) {
        if !self.ready.load(Ordering::Acquire) {
            return;
        }
        push_command(&self.commands, cmd);
    }
}

impl AudioChannel for OutputChannel {
    fn assign(&mut self, track: &TrackRef) {
        self.track = Some(track.clone());
    }

    fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    fn set_looping(&mut self, looping: bool) {
        self.send(MixerCommand::SetLooping {
            deck: self.deck,
            looping,
        });
    }

    fn rewind(&mut self) {
        self.send(MixerCommand::Rewind { deck: self.deck });
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.send(MixerCommand::SetVolume {
            deck: self.deck,
            volume: self.volume,
        });
    }

    fn start(&mut self, ticket: PlayTicket) {
        self.paused = false;
        self.live.store(ticket.0, Ordering::Release);

        if !self.ready.load(Ordering::Acquire) {
            let _ = self.completions.send(Completion {
                ticket,
                result: Err(PlaybackError::Blocked("audio output not started".to_string())),
            });
            return;
        }
        let Some(track) = self.track.clone() else {
            let _ = self.completions.send(Completion {
                ticket,
                result: Err(PlaybackError::Resource("no track assigned".to_string())),
            });
            return;
        };

        let deck = self.deck;
        let commands = Arc::clone(&self.commands);
        let cache = Arc::clone(&self.cache);
        let live = Arc::clone(&self.live);
        let completions = self.completions.clone();
        thread::spawn(move || {
            let is_live = || live.load(Ordering::Acquire) == ticket.0;
            if !is_live() {
                return;
            }
            let pcm = match cache.get(track.path()) {
                Some(pcm) => pcm,
                None => match decode_file(track.path()) {
                    Ok(pcm) => {
                        if !is_live() {
                            debug!(track = %track, "start superseded before decode finished");
                            return;
                        }
                        let pcm = Arc::new(pcm);
                        cache.insert(track.path(), Arc::clone(&pcm));
                        pcm
                    }
                    Err(err) => {
                        let _ = completions.send(Completion {
                            ticket,
                            result: Err(PlaybackError::Resource(format!("{err:#}"))),
                        });
                        return;
                    }
                },
            };
            match queue_start(&commands, &live, ticket, deck, pcm) {
                Some(result) => {
                    let _ = completions.send(Completion { ticket, result });
                }
                None => debug!(track = %track, "start superseded before it was queued"),
            }
        });
    }

    fn pause(&mut self) {
        self.paused = true;
        self.live.store(0, Ordering::Release);
        self.send(MixerCommand::Pause { deck: self.deck });
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Observer as _, Producer as _, Split as _};

    fn mixer_with_queue() -> (Mixer, ringbuf::HeapProd<MixerCommand>) {
        let (prod, cons) = HeapRb::<MixerCommand>::new(16).split();
        (Mixer::new(cons, 100, 2), prod)
    }

    fn tone(value: f32, frames: usize) -> Arc<Pcm> {
        Arc::new(Pcm {
            samples: vec![value; frames],
            channels: 1,
            sample_rate: 100,
        })
    }

    #[test]
    fn decks_mix_at_their_volumes() {
        let (mut mixer, mut prod) = mixer_with_queue();
        for (deck, v) in [(0usize, 0.5f32), (1, 0.25)] {
            let _ = prod.try_push(MixerCommand::Load { deck, pcm: tone(0.8, 8) });
            let _ = prod.try_push(MixerCommand::SetVolume { deck, volume: v });
            let _ = prod.try_push(MixerCommand::Play { deck });
        }
        let mut out = vec![0.0f32; 4];
        mixer.render(&mut out);
        for s in out {
            assert!((s - 0.6).abs() < 1e-6);
        }
    }

    #[test]
    fn one_shot_deck_stops_at_end() {
        let (mut mixer, mut prod) = mixer_with_queue();
        let _ = prod.try_push(MixerCommand::Load { deck: 2, pcm: tone(1.0, 2) });
        let _ = prod.try_push(MixerCommand::SetVolume { deck: 2, volume: 1.0 });
        let _ = prod.try_push(MixerCommand::Play { deck: 2 });
        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(&out[..4], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&out[4..], &[0.0, 0.0, 0.0, 0.0]);
        assert!(!mixer.decks[2].playing);
    }

    #[test]
    fn looping_deck_wraps() {
        let (mut mixer, mut prod) = mixer_with_queue();
        let _ = prod.try_push(MixerCommand::Load { deck: 0, pcm: tone(0.5, 2) });
        let _ = prod.try_push(MixerCommand::SetLooping { deck: 0, looping: true });
        let _ = prod.try_push(MixerCommand::SetVolume { deck: 0, volume: 1.0 });
        let _ = prod.try_push(MixerCommand::Play { deck: 0 });
        let mut out = vec![0.0f32; 10];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
        assert!(mixer.decks[0].playing);
    }

    fn queue_with(capacity: usize) -> (CommandQueue, ringbuf::HeapCons<MixerCommand>) {
        let (prod, cons) = HeapRb::<MixerCommand>::new(capacity).split();
        (Arc::new(Mutex::new(prod)), cons)
    }

    #[test]
    fn live_start_queues_load_and_play() {
        let (queue, cons) = queue_with(8);
        let live = AtomicU64::new(5);
        let result = queue_start(&queue, &live, PlayTicket(5), 1, tone(0.1, 4));
        assert_eq!(result, Some(Ok(())));
        assert_eq!(cons.occupied_len(), 2);
    }

    #[test]
    fn paused_deck_gets_nothing_queued() {
        let (queue, cons) = queue_with(8);
        let live = AtomicU64::new(0);
        assert_eq!(queue_start(&queue, &live, PlayTicket(5), 2, tone(0.1, 4)), None);
        assert_eq!(cons.occupied_len(), 0);
    }

    #[test]
    fn full_queue_is_a_resource_error() {
        let (queue, cons) = queue_with(2);
        assert!(push_command(&queue, MixerCommand::Pause { deck: 0 }));
        let live = AtomicU64::new(7);
        let result = queue_start(&queue, &live, PlayTicket(7), 0, tone(0.1, 4));
        assert!(matches!(result, Some(Err(PlaybackError::Resource(_)))));
        assert_eq!(cons.occupied_len(), 1);
    }
}
