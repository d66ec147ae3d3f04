use crate::track::DEFAULT_TRACK;
use std::path::Path;

pub const ACTION_TRACK: &str = "nastelbom-action-440170.mp3";
pub const CALM_TRACK: &str = "fassounds-lofi-study-calm-peaceful-chill-hop-112191.mp3";

const BUILTIN_RULES: &[(&[&str], &str)] = &[
    (&["running", "run"], ACTION_TRACK),
    (&["walking", "walk", "confident_walk"], CALM_TRACK),
    (&["hip_hop"], "alexgrohl-sad-soul-sad-hip-hop-chasing-a-feeling-185750.mp3"),
    (&["gangnam"], "9jackjack8-club-vocal-house-343307.mp3"),
    (&["all_night"], "the__mountain-deep-house-483808.mp3"),
    (
        &["cardio"],
        "looksmusic-120-bpm-__allure__-g-maj_hard-dj-music-mix-2025-435599.mp3",
    ),
    (&["magic", "genie"], "vaitsez-arabic-drill-trap-beat-482050.mp3"),
    (
        &["funny", "bubble", "boom"],
        "music-for-videos-cheerful-electro-swing-152580.mp3",
    ),
    (
        &["pop", "denim", "crystal", "arm_circle"],
        "nastelbom-fashion-house-321608.mp3",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRule {
    pub keywords: Vec<String>,
    pub track: String,
}

impl TrackRule {
    fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| normalized.contains(k.as_str()))
    }
}

/// Ordered clip-name rules. The first rule with a keyword contained in the
/// normalized clip name decides the track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMap {
    rules: Vec<TrackRule>,
    default_track: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackMapError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("track map must contain at least one rule")]
    EmptyRules,
}

impl Default for TrackMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TrackMap {
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(keywords, track)| TrackRule {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                track: track.to_string(),
            })
            .collect();
        Self {
            rules,
            default_track: DEFAULT_TRACK.to_string(),
        }
    }

    /// Parses the rule file format:
    ///
    /// ```text
    /// # comment
    /// rule <track> <keyword> [keyword...]
    /// default <track>
    /// ```
    pub fn parse(text: &str) -> Result<Self, TrackMapError> {
        let mut rules = Vec::new();
        let mut default_track = DEFAULT_TRACK.to_string();

        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            match tokens.as_slice() {
                ["rule"] => {
                    return Err(TrackMapError::Parse {
                        line: line_no,
                        message: "rule expects: rule <track> <keyword> [keyword...]".to_string(),
                    });
                }
                ["rule", track, keywords @ ..] => {
                    if keywords.is_empty() {
                        return Err(TrackMapError::Parse {
                            line: line_no,
                            message: "rule expects: rule <track> <keyword> [keyword...]"
                                .to_string(),
                        });
                    }
                    rules.push(TrackRule {
                        keywords: keywords.iter().map(|k| normalize_clip_name(k)).collect(),
                        track: track.to_string(),
                    });
                }
                ["default", track] => default_track = track.to_string(),
                ["default", ..] => {
                    return Err(TrackMapError::Parse {
                        line: line_no,
                        message: "default expects: default <track>".to_string(),
                    });
                }
                [other, ..] => {
                    return Err(TrackMapError::Parse {
                        line: line_no,
                        message: format!("expected 'rule' or 'default', got '{other}'"),
                    });
                }
                [] => {}
            }
        }

        if rules.is_empty() {
            return Err(TrackMapError::EmptyRules);
        }
        Ok(Self {
            rules,
            default_track,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackMapError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TrackMapError::Io(e.to_string()))?;
        Self::parse(&text)
    }

    pub fn rules(&self) -> &[TrackRule] {
        &self.rules
    }

    pub fn default_track(&self) -> &str {
        &self.default_track
    }

    /// Picks the track for `clip`. Falls back to `selected`, then to the default track.
    pub fn map_clip_to_track<'a>(&'a self, clip: &str, selected: Option<&'a str>) -> &'a str {
        let normalized = normalize_clip_name(clip);
        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| rule.track.as_str())
            .or(selected.filter(|s| !s.is_empty()))
            .unwrap_or(self.default_track.as_str())
    }
}

/// Lowercases and folds each run of whitespace or hyphens into a single `_`.
pub fn normalize_clip_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    for c in name.chars() {
        let class = if c.is_whitespace() {
            Some(' ')
        } else if c == '-' {
            Some('-')
        } else {
            None
        };
        match class {
            Some(k) => {
                if prev != Some(k) {
                    out.push('_');
                }
                prev = Some(k);
            }
            None => {
                out.extend(c.to_lowercase());
                prev = None;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::normalize_clip_name;

    #[test]
    fn folds_runs_per_separator_kind() {
        assert_eq!(normalize_clip_name("Hip  Hop"), "hip_hop");
        assert_eq!(normalize_clip_name("Arm--Circle"), "arm_circle");
        assert_eq!(normalize_clip_name("a -b"), "a__b");
        assert_eq!(normalize_clip_name("\tWALK\n"), "_walk_");
    }
}
