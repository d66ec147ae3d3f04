use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stage-music",
    version,
    about = "Stage show console: animation clips with crossfaded background music"
)]
pub struct Config {
    /// Directory holding the music tracks.
    #[arg(long, default_value = "sounds")]
    pub sounds_dir: PathBuf,

    /// Applause sample played by the applause effect.
    #[arg(long, default_value = "applause/applause.mp3")]
    pub applause: PathBuf,

    /// Clip list file, one animation clip name per line.
    #[arg(long)]
    pub clips: Option<PathBuf>,

    /// Extra clip name (repeatable).
    #[arg(long = "clip")]
    pub clip: Vec<String>,

    /// Clip-to-track rule file replacing the built-in rules.
    #[arg(long)]
    pub track_map: Option<PathBuf>,

    /// Track selected at startup.
    #[arg(long, default_value = crate::track::DEFAULT_TRACK)]
    pub track: String,

    #[arg(long, default_value_t = 0.6, value_parser = parse_volume)]
    pub volume: f32,

    #[arg(long, default_value_t = 600)]
    pub fade_ms: u64,

    #[arg(long, default_value_t = 6.0)]
    pub applause_secs: f32,

    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Log destination; an empty value turns logging off.
    #[arg(long, default_value = "stage_music.log", value_parser = parse_log_file)]
    pub log_file: PathBuf,
}

fn parse_volume(raw: &str) -> Result<f32, String> {
    let v = raw
        .parse::<f32>()
        .map_err(|_| format!("invalid volume '{raw}'"))?;
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(format!("volume must be within 0..1, got {raw}"));
    }
    Ok(v)
}

fn parse_log_file(raw: &str) -> Result<PathBuf, String> {
    Ok(PathBuf::from(raw))
}
