use stage_music::clips::ClipLibrary;
use stage_music::mapper::{ACTION_TRACK, CALM_TRACK, TrackMap, TrackMapError, normalize_clip_name};
use stage_music::track::{BUILTIN_TRACKS, CatalogError, DEFAULT_TRACK, TrackCatalog};
use std::path::PathBuf;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stage_music_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

#[test]
fn builtin_rules_map_clip_names() {
    let map = TrackMap::builtin();
    assert_eq!(map.map_clip_to_track("Running_01", None), ACTION_TRACK);
    assert_eq!(map.map_clip_to_track("Confident_Walk", None), CALM_TRACK);
    assert_eq!(map.map_clip_to_track("unknown_clip_xyz", Some("chosen.mp3")), "chosen.mp3");
    assert_eq!(map.map_clip_to_track("unknown_clip_xyz", None), DEFAULT_TRACK);
    assert_eq!(map.map_clip_to_track("unknown_clip_xyz", Some("")), DEFAULT_TRACK);
}

#[test]
fn separators_are_normalized_before_matching() {
    let map = TrackMap::builtin();
    assert_eq!(
        map.map_clip_to_track("Hip Hop Dancing", None),
        "alexgrohl-sad-soul-sad-hip-hop-chasing-a-feeling-185750.mp3"
    );
    assert_eq!(
        map.map_clip_to_track("ARM-CIRCLE", None),
        "nastelbom-fashion-house-321608.mp3"
    );
    assert_eq!(normalize_clip_name("Confident Walk"), "confident_walk");
    assert_eq!(normalize_clip_name("Gangnam--Style"), "gangnam_style");
}

#[test]
fn first_matching_rule_wins() {
    let map = TrackMap::builtin();
    // "run" comes before "walk" in the rule list.
    assert_eq!(map.map_clip_to_track("walk_then_run", None), ACTION_TRACK);
    assert_eq!(map.rules()[0].track, ACTION_TRACK);
    assert_eq!(map.default_track(), DEFAULT_TRACK);
}

#[test]
fn every_builtin_rule_points_at_a_builtin_track() {
    let map = TrackMap::builtin();
    for rule in map.rules() {
        assert!(
            BUILTIN_TRACKS.contains(&rule.track.as_str()),
            "rule track {} missing from catalog",
            rule.track
        );
    }
}

#[test]
fn rule_file_parses_and_replaces_builtin_rules() {
    let text = r#"
        # stage two
        rule finale.mp3 Bow Curtain-Call
        rule opener.mp3 intro
        default lobby.mp3
    "#;
    let map = TrackMap::parse(text).expect("rule file should parse");
    assert_eq!(map.rules().len(), 2);
    assert_eq!(map.rules()[0].keywords, vec!["bow", "curtain_call"]);
    assert_eq!(map.default_track(), "lobby.mp3");
    assert_eq!(map.map_clip_to_track("Final Curtain Call", None), "finale.mp3");
    assert_eq!(map.map_clip_to_track("Running_01", None), "lobby.mp3");
}

#[test]
fn rule_file_errors_carry_line_numbers() {
    let err = TrackMap::parse("rule a.mp3 x\nrule b.mp3\n").expect_err("keywordless rule");
    assert!(matches!(err, TrackMapError::Parse { line: 2, .. }));

    let err = TrackMap::parse("rule\n").expect_err("bare rule");
    assert!(matches!(err, TrackMapError::Parse { line: 1, .. }));

    let err = TrackMap::parse("rule a.mp3 x\n\ndefault\n").expect_err("empty default");
    assert!(matches!(err, TrackMapError::Parse { line: 3, .. }));

    let err = TrackMap::parse("track a.mp3 x\n").expect_err("unknown directive");
    assert!(err.to_string().contains("line 1"));

    let err = TrackMap::parse("# only comments\ndefault a.mp3\n").expect_err("no rules");
    assert_eq!(err, TrackMapError::EmptyRules);
}

#[test]
fn rule_file_load_reports_io_errors() {
    let dir = scratch_dir("rules");
    let missing = TrackMap::load(dir.join("missing.rules"));
    assert!(matches!(missing, Err(TrackMapError::Io(_))));

    let path = dir.join("show.rules");
    std::fs::write(&path, "rule x.mp3 spin\n").expect("rule file should be writable");
    let map = TrackMap::load(&path).expect("rule file should load");
    assert_eq!(map.map_clip_to_track("Spin_Move", None), "x.mp3");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn catalog_scan_lists_audio_files_sorted() {
    let dir = scratch_dir("catalog");
    for name in ["b.mp3", "a.WAV", "notes.txt", "c.ogg"] {
        std::fs::write(dir.join(name), b"").expect("fixture should be writable");
    }
    let catalog = TrackCatalog::scan(&dir);
    assert_eq!(catalog.names(), ["a.WAV", "b.mp3", "c.ogg"]);
    assert_eq!(catalog.resolve("b.mp3").map(|t| t.path().to_path_buf()), Ok(dir.join("b.mp3")));
    assert_eq!(
        catalog.resolve("notes.txt"),
        Err(CatalogError::UnknownTrack("notes.txt".to_string()))
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn catalog_falls_back_to_builtin_names() {
    let catalog = TrackCatalog::scan("/definitely/not/a/real/dir");
    assert_eq!(catalog.len(), BUILTIN_TRACKS.len());
    assert!(catalog.contains(DEFAULT_TRACK));
}

#[test]
fn catalog_stepping_wraps() {
    let catalog = TrackCatalog::new("sounds", vec!["a".into(), "b".into(), "c".into()]);
    assert_eq!(catalog.step_from(Some("c"), true), Some("a"));
    assert_eq!(catalog.step_from(Some("a"), false), Some("c"));
    assert_eq!(catalog.step_from(Some("zzz"), true), Some("a"));
    assert_eq!(catalog.step_from(None, false), Some("a"));
}

#[test]
fn clip_list_parses_and_dedups() {
    let mut lib = ClipLibrary::parse("# clips\nIntro\n\n  Bow  \nIntro\n");
    assert_eq!(lib.names(), ["Intro", "Bow"]);
    lib.extend(["Encore", "Bow", ""]);
    assert_eq!(lib.names(), ["Intro", "Bow", "Encore"]);
    assert_eq!(lib.step_from(Some("Encore"), true), Some("Intro"));
    assert_eq!(lib.step_from(Some("missing"), false), Some("Encore"));
}
