use clap::Parser;
use stage_music::config::Config;
use stage_music::track::DEFAULT_TRACK;
use std::path::PathBuf;

#[test]
fn defaults_match_the_stage_setup() {
    let cfg = Config::try_parse_from(["stage-music"]).expect("defaults should parse");
    assert_eq!(cfg.sounds_dir, PathBuf::from("sounds"));
    assert_eq!(cfg.applause, PathBuf::from("applause/applause.mp3"));
    assert_eq!(cfg.track, DEFAULT_TRACK);
    assert_eq!(cfg.volume, 0.6);
    assert_eq!(cfg.fade_ms, 600);
    assert_eq!(cfg.applause_secs, 6.0);
    assert_eq!(cfg.fps, 30);
    assert_eq!(cfg.log_file, PathBuf::from("stage_music.log"));
    assert!(cfg.clips.is_none());
    assert!(cfg.clip.is_empty());
    assert!(cfg.track_map.is_none());
    assert!(cfg.device.is_none());
    assert!(!cfg.list_devices);
}

#[test]
fn flags_override_defaults() {
    let cfg = Config::try_parse_from([
        "stage-music",
        "--sounds-dir",
        "/srv/music",
        "--clip",
        "Intro",
        "--clip",
        "Bow",
        "--volume",
        "0.25",
        "--fade-ms",
        "1200",
        "--track-map",
        "show.rules",
        "--log-file",
        "",
    ])
    .expect("overrides should parse");
    assert_eq!(cfg.sounds_dir, PathBuf::from("/srv/music"));
    assert_eq!(cfg.clip, vec!["Intro", "Bow"]);
    assert_eq!(cfg.volume, 0.25);
    assert_eq!(cfg.fade_ms, 1200);
    assert_eq!(cfg.track_map, Some(PathBuf::from("show.rules")));
    assert!(cfg.log_file.as_os_str().is_empty());
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(Config::try_parse_from(["stage-music", "--volume", "1.5"]).is_err());
    assert!(Config::try_parse_from(["stage-music", "--volume", "loud"]).is_err());
    assert!(Config::try_parse_from(["stage-music", "--fps", "0"]).is_err());
    assert!(Config::try_parse_from(["stage-music", "--fps", "1000"]).is_err());
}
