use crate::clips::ClipLibrary;
use crate::config::Config;
use crate::crossfade::{MusicController, MusicState};
use crate::mapper::TrackMap;
use crate::output::{OutputChannel, OutputContext};
use crate::show::{PARTICLE_LIFETIME, Show};
use crate::terminal::TerminalGuard;
use crate::track::{TrackCatalog, TrackRef};
use anyhow::Context;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{QueueableCommand, queue};
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};
use tracing::{info, warn};

type ConsoleShow = Show<OutputChannel, OutputContext>;

const VOLUME_STEP: f32 = 0.05;
const CLIP_WINDOW: usize = 7;

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let mut show = build_show(&cfg)?;
    show.start();
    info!(status = %show.music().status_line(), "show started");

    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());

    let mut last_frame = Instant::now();

    loop {
        let now = Instant::now();

        // Drain input events (non-blocking).
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    show.interact();
                    if handle_key(k.code, k.modifiers, &mut show) {
                        return Ok(());
                    }
                }
                Event::Mouse(m) if matches!(m.kind, MouseEventKind::Down(_)) => {
                    show.interact();
                }
                _ => {}
            }
        }

        let done = show.music().context().drain_completions();
        for c in done {
            match c.result {
                Ok(()) => {
                    show.playback_started(c.ticket);
                }
                Err(err) => {
                    show.playback_failed(c.ticket, err);
                }
            }
        }

        let dt = now.duration_since(last_frame);
        last_frame = now;
        show.advance(dt);

        let size = crossterm::terminal::size().context("get terminal size")?;
        draw(&mut out, &show, size)?;

        // Frame pacing.
        let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

fn build_show(cfg: &Config) -> anyhow::Result<ConsoleShow> {
    let catalog = TrackCatalog::scan(&cfg.sounds_dir);
    info!(root = %catalog.root().display(), tracks = catalog.len(), "track catalog ready");

    let mut clip_status = None;
    let mut clips = match cfg.clips.as_ref() {
        Some(path) => match ClipLibrary::load(path) {
            Ok(lib) => lib,
            Err(err) => {
                warn!(error = %err, "clip list unavailable");
                clip_status = Some("Error loading clip list");
                ClipLibrary::default()
            }
        },
        None => ClipLibrary::default(),
    };
    clips.extend(cfg.clip.iter().cloned());

    let track_map = match cfg.track_map.as_ref() {
        Some(path) => TrackMap::load(path)
            .with_context(|| format!("load track map {}", path.display()))?,
        None => TrackMap::builtin(),
    };

    let context = OutputContext::new(cfg.device.as_deref());
    let a = context.channel(0);
    let b = context.channel(1);
    let applause_channel = context.channel(2);

    let selected = catalog.contains(&cfg.track).then(|| cfg.track.clone());
    if selected.is_none() {
        warn!(track = %cfg.track, "startup track not in catalog");
    }
    let music = MusicController::new(
        catalog,
        context,
        a,
        b,
        cfg.volume,
        Duration::from_millis(cfg.fade_ms),
    )
    .with_selected(selected);

    let applause_name = cfg
        .applause
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("applause")
        .to_string();
    let applause_track = TrackRef::new(applause_name, cfg.applause.clone());

    let mut show = Show::new(music, clips, track_map, applause_channel, Some(applause_track))
        .with_applause_duration(applause_duration(cfg.applause_secs));
    if let Some(status) = clip_status {
        show = show.with_clip_status(status);
    }
    Ok(show)
}

fn applause_duration(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f32(secs.min(600.0))
    } else {
        Duration::ZERO
    }
}

fn handle_key(code: KeyCode, mods: KeyModifiers, show: &mut ConsoleShow) -> bool {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return true;
    }

    match code {
        KeyCode::Esc => true,
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Enter => {
            if let Some(clip) = show.selected_clip().map(str::to_string) {
                show.play_clip(&clip);
            }
            false
        }
        KeyCode::Left => {
            show.prev_clip();
            false
        }
        KeyCode::Right => {
            show.next_clip();
            false
        }
        KeyCode::Char('s') | KeyCode::Char('S') => {
            show.stop_clip();
            false
        }
        KeyCode::Char('a') | KeyCode::Char('A') => {
            show.trigger_applause();
            false
        }
        KeyCode::Char('[') => {
            show.step_music(false);
            false
        }
        KeyCode::Char(']') => {
            show.step_music(true);
            false
        }
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
            show.nudge_volume(VOLUME_STEP);
            false
        }
        KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Down => {
            show.nudge_volume(-VOLUME_STEP);
            false
        }
        _ => false,
    }
}

fn draw(out: &mut impl Write, show: &ConsoleShow, (cols, rows): (u16, u16)) -> anyhow::Result<()> {
    let width = cols as usize;
    let lines = build_panel(show, width);

    for (row, line) in lines.iter().enumerate().take(rows as usize) {
        queue!(
            out,
            MoveTo(0, row as u16),
            Clear(ClearType::UntilNewLine),
            Print(truncate_for_width(line, width))
        )?;
    }

    let top = lines.len() as u16;
    for row in top..rows {
        out.queue(MoveTo(0, row))?.queue(Clear(ClearType::UntilNewLine))?;
    }

    // Confetti falls through the space under the panel.
    let stage_rows = rows.saturating_sub(top);
    if stage_rows > 0 && cols > 0 {
        for p in show.particles() {
            let fall = p.age.as_secs_f32() / PARTICLE_LIFETIME.as_secs_f32();
            let row = top + ((fall.clamp(0.0, 1.0) * (stage_rows - 1) as f32) as u16);
            let col = ((p.column * cols as f32) as u16).min(cols - 1);
            queue!(out, MoveTo(col, row), Print('*'))?;
        }
    }

    out.flush()?;
    Ok(())
}

fn build_panel(show: &ConsoleShow, width: usize) -> Vec<String> {
    let music = show.music();
    let mut lines = Vec::new();

    lines.push("STAGE MUSIC".to_string());
    lines.push(String::new());

    let clips = show.clips();
    let clip_line = match show.current_clip() {
        Some(c) => format!("Clip: {c}"),
        None => "Clip: (stopped)".to_string(),
    };
    lines.push(clip_line);
    if !show.clip_status().is_empty() {
        lines.push(show.clip_status().to_string());
    }

    let cursor = show
        .selected_clip()
        .and_then(|c| clips.position(c))
        .unwrap_or(0);
    let start = centered_window_start(cursor, clips.len(), CLIP_WINDOW);
    for name in clips.names().iter().skip(start).take(CLIP_WINDOW) {
        let marker = if Some(name.as_str()) == show.selected_clip() { '>' } else { ' ' };
        lines.push(format!(" {marker} {name}"));
    }
    lines.push(String::new());

    lines.push(format!("Music: {}", music.status_line()));
    lines.push(format!(
        "Track: {}",
        music.selected_track().unwrap_or("-")
    ));
    let fade = match music.state() {
        MusicState::Fading { progress, .. } => format!("  fade {}", progress_bar(*progress, 20)),
        _ => String::new(),
    };
    lines.push(format!(
        "Volume: {:>3}%  channel {}{}",
        (music.volume() * 100.0).round() as u32,
        music.active_channel(),
        fade
    ));
    if show.is_applauding() {
        lines.push("Applause active...".to_string());
    }
    lines.push(String::new());
    lines.push(
        "Enter play | Left/Right clip | s stop | a applause | [ ] track | +/- volume | q quit"
            .to_string(),
    );

    lines.into_iter().map(|l| truncate_for_width(&l, width)).collect()
}

fn progress_bar(progress: f32, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn centered_window_start(cursor: usize, total: usize, window: usize) -> usize {
    if total <= window {
        return 0;
    }
    let half = window / 2;
    cursor.saturating_sub(half).min(total - window)
}

fn truncate_for_width(s: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let count = s.chars().count();
    if count <= width {
        return s.to_string();
    }
    if width <= 3 {
        return s.chars().take(width).collect();
    }
    let mut out: String = s.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_cursor_visible() {
        assert_eq!(centered_window_start(0, 3, 7), 0);
        assert_eq!(centered_window_start(5, 20, 7), 2);
        assert_eq!(centered_window_start(19, 20, 7), 13);
    }

    #[test]
    fn truncation_marks_cut_text() {
        assert_eq!(truncate_for_width("abcdef", 10), "abcdef");
        assert_eq!(truncate_for_width("abcdefghij", 6), "abc...");
        assert_eq!(truncate_for_width("abc", 2), "ab");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.5, 4), "[##--]");
        assert_eq!(progress_bar(2.0, 4), "[####]");
    }

    #[test]
    fn applause_duration_rejects_bad_values() {
        assert_eq!(applause_duration(f32::NAN), Duration::ZERO);
        assert_eq!(applause_duration(-1.0), Duration::ZERO);
        assert_eq!(applause_duration(6.0), Duration::from_secs(6));
    }
}
