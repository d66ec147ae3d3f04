use anyhow::{Context, anyhow};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fully decoded, interleaved audio.
#[derive(Debug, Clone)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Pcm {
    pub fn frames(&self) -> usize {
        self.samples.len() / (self.channels.max(1) as usize)
    }

    /// Sample for output channel `out_ch` of `frame`. Mono sources feed every
    /// output channel; surplus source channels are dropped.
    pub fn sample(&self, frame: usize, out_ch: usize) -> f32 {
        let ch = self.channels.max(1) as usize;
        let src_ch = out_ch.min(ch - 1);
        self.samples.get(frame * ch + src_ch).copied().unwrap_or(0.0)
    }

    pub fn duration_s(&self) -> f32 {
        self.frames() as f32 / self.sample_rate.max(1) as f32
    }
}

pub fn decode_file(path: &Path) -> anyhow::Result<Pcm> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("probe {}", path.display()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no audio track in {}", path.display()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("create decoder")?;

    let mut samples = Vec::<f32>::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("read packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(path = %path.display(), msg, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e).context("decode packet"),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() {
        return Err(anyhow!("no audio decoded from {}", path.display()));
    }
    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        frames = samples.len() / channels.max(1) as usize,
        "decoded"
    );
    Ok(Pcm {
        samples,
        channels,
        sample_rate,
    })
}

/// Recently decoded tracks, least recently used first. Holds at most
/// `capacity` entries so memory stays bounded by the decks in use.
#[derive(Debug)]
pub struct DecodeCache {
    capacity: usize,
    entries: Mutex<VecDeque<(PathBuf, Arc<Pcm>)>>,
}

impl DecodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached audio for `path`; a hit becomes the most recently used entry.
    pub fn get(&self, path: &Path) -> Option<Arc<Pcm>> {
        let mut entries = self.entries.lock().ok()?;
        let idx = entries.iter().position(|(p, _)| p == path)?;
        let entry = entries.remove(idx)?;
        let pcm = Arc::clone(&entry.1);
        entries.push_back(entry);
        Some(pcm)
    }

    pub fn insert(&self, path: &Path, pcm: Arc<Pcm>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.retain(|(p, _)| p != path);
        entries.push_back((path.to_path_buf(), pcm));
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.pop_front() {
                debug!(path = %evicted.display(), "evicted decoded track");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeCache, Pcm};
    use std::path::Path;
    use std::sync::Arc;

    fn silence() -> Arc<Pcm> {
        Arc::new(Pcm {
            samples: vec![0.0; 4],
            channels: 1,
            sample_rate: 8_000,
        })
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let cache = DecodeCache::new(3);
        for name in ["a.mp3", "b.mp3", "c.mp3"] {
            cache.insert(Path::new(name), silence());
        }
        assert!(cache.get(Path::new("a.mp3")).is_some());

        cache.insert(Path::new("d.mp3"), silence());
        assert_eq!(cache.len(), 3);
        assert!(cache.get(Path::new("b.mp3")).is_none());
        assert!(cache.get(Path::new("a.mp3")).is_some());
        assert!(cache.get(Path::new("c.mp3")).is_some());
        assert!(cache.get(Path::new("d.mp3")).is_some());
    }

    #[test]
    fn stepping_through_many_tracks_stays_bounded() {
        let cache = DecodeCache::new(3);
        for i in 0..15 {
            cache.insert(Path::new(&format!("track-{i}.mp3")), silence());
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(Path::new("track-14.mp3")).is_some());
        assert!(cache.get(Path::new("track-0.mp3")).is_none());
    }

    #[test]
    fn reinserting_a_path_keeps_one_entry() {
        let cache = DecodeCache::new(2);
        cache.insert(Path::new("a.mp3"), silence());
        cache.insert(Path::new("a.mp3"), silence());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mono_feeds_every_output_channel() {
        let pcm = Pcm {
            samples: vec![0.1, 0.2, 0.3],
            channels: 1,
            sample_rate: 48_000,
        };
        assert_eq!(pcm.frames(), 3);
        assert_eq!(pcm.sample(1, 0), 0.2);
        assert_eq!(pcm.sample(1, 1), 0.2);
        assert_eq!(pcm.sample(9, 0), 0.0);
    }

    #[test]
    fn stereo_maps_channels_in_order() {
        let pcm = Pcm {
            samples: vec![0.1, -0.1, 0.2, -0.2],
            channels: 2,
            sample_rate: 44_100,
        };
        assert_eq!(pcm.sample(1, 0), 0.2);
        assert_eq!(pcm.sample(1, 1), -0.2);
        assert_eq!(pcm.sample(1, 5), -0.2);
    }
}
