use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Playlist shipped with the show. Used when the sounds directory has no audio files of its own.
pub const BUILTIN_TRACKS: [&str; 15] = [
    "9jackjack8-club-vocal-house-343307.mp3",
    "alexgrohl-sad-soul-sad-hip-hop-chasing-a-feeling-185750.mp3",
    "fassounds-lofi-study-calm-peaceful-chill-hop-112191.mp3",
    "giorgiovitte-berry-groovy-bass-trap-476603.mp3",
    "justchilling1991-black-mamba-243827.mp3",
    "looksmusic-120-bpm-__allure__-g-maj_hard-dj-music-mix-2025-435599.mp3",
    "music-for-videos-cheerful-electro-swing-152580.mp3",
    "music-for-videos-donx27t-say-goodbye-funny-electro-swing-song-151282.mp3",
    "music-for-videos-immersing-into-electro-swing-152574.mp3",
    "music-for-videos-swinging-electro-swing-funny-catchy-151280.mp3",
    "nastelbom-action-440170.mp3",
    "nastelbom-fashion-house-321608.mp3",
    "onesevenbeatxs-aggressive-hard-dark-trap-beat-prod-by-onesevenbeatxs-309327.mp3",
    "the__mountain-deep-house-483808.mp3",
    "vaitsez-arabic-drill-trap-beat-482050.mp3",
];

pub const DEFAULT_TRACK: &str = "nastelbom-fashion-house-321608.mp3";

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "flac"];

/// A catalog track: its file name and where it lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    name: String,
    path: PathBuf,
}

impl TrackRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown track: {0}")]
    UnknownTrack(String),
}

#[derive(Debug, Clone)]
pub struct TrackCatalog {
    root: PathBuf,
    names: Vec<String>,
}

impl TrackCatalog {
    pub fn new(root: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            root: root.into(),
            names,
        }
    }

    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        Self::new(root, BUILTIN_TRACKS.iter().map(|s| s.to_string()).collect())
    }

    /// Lists audio files under `root`, falling back to the built-in playlist when
    /// the directory is missing or holds nothing playable.
    pub fn scan(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut names = match fs::read_dir(&root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_audio_extension(p))
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        if names.is_empty() {
            return Self::builtin(root);
        }
        names.sort();
        Self { root, names }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn resolve(&self, name: &str) -> Result<TrackRef, CatalogError> {
        if !self.contains(name) {
            return Err(CatalogError::UnknownTrack(name.to_string()));
        }
        Ok(TrackRef::new(name, self.root.join(name)))
    }

    /// Neighbour of `current` in catalog order, wrapping at both ends.
    pub fn step_from(&self, current: Option<&str>, forward: bool) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let n = self.names.len();
        let next = match current.and_then(|c| self.position(c)) {
            Some(i) if forward => (i + 1) % n,
            Some(i) => (i + n - 1) % n,
            None => 0,
        };
        self.names.get(next).map(String::as_str)
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
