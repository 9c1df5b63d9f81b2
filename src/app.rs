//! Headless grid host.
//!
//! Scans a directory, probes every image, lays the grid out and replays
//! scroll, pinch and click input against it, writing each rendered frame to
//! a PNG file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::GridConfig;
use crate::layout::LayoutEngine;
use crate::media::{FsMediaProvider, ImageCache, ProbePool};
use crate::models::{MediaId, Tile};
use crate::render::{FrameStats, GridRenderer, RgbaCanvas};
use crate::scanner::{FileScanner, ScanConfig};
use crate::viewport::{CullMode, ScrollOutcome, SelectionSink, ZoomDamping};

/// How long a frame waits for visible decodes before it is written anyway.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for decodes.
const POLL_INTERVAL: Duration = Duration::from_millis(16); // ~60fps

/// One replayed input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Scroll(f64),
    Pinch(f64),
    Click(f64, f64),
}

#[derive(Debug, Clone)]
pub struct AppArgs {
    pub path: PathBuf,
    pub out: PathBuf,
    pub recursive: bool,
    pub workers: usize,
    pub cache_mb: usize,
    pub config: GridConfig,
    pub events: Vec<InputEvent>,
}

/// Parses `flowgrid [options] <directory>`.
pub fn parse_args<I>(args: I) -> Result<AppArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut path: Option<PathBuf> = None;
    let mut out = PathBuf::from("frames");
    let mut recursive = false;
    let mut workers: usize = crate::media::decode_queue::DEFAULT_WORKERS;
    let mut cache_mb: usize = crate::media::cache::DEFAULT_MAX_MEMORY_MB;
    let mut config = GridConfig::default();
    let mut events = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if parse_grid_flag(&arg, &mut args, &mut config)? {
            continue;
        }
        match arg.as_str() {
            "--path" => path = Some(next_value(&arg, &mut args)?),
            "--out" => out = next_value(&arg, &mut args)?,
            "--recursive" => recursive = true,
            "--workers" => workers = next_value(&arg, &mut args)?,
            "--cache-mb" => cache_mb = next_value(&arg, &mut args)?,
            "--scroll" => {
                for delta in parse_list(&arg, &next_value::<String>(&arg, &mut args)?)? {
                    events.push(InputEvent::Scroll(delta));
                }
            }
            "--pinch" => {
                for factor in parse_list(&arg, &next_value::<String>(&arg, &mut args)?)? {
                    events.push(InputEvent::Pinch(factor));
                }
            }
            "--click" => {
                let coords = parse_list(&arg, &next_value::<String>(&arg, &mut args)?)?;
                let [x, y] = coords[..] else {
                    bail!("--click expects x,y");
                };
                events.push(InputEvent::Click(x, y));
            }
            _ if !arg.starts_with('-') && path.is_none() => path = Some(PathBuf::from(&arg)),
            _ => bail!("Unknown argument: {}", arg),
        }
    }

    if workers == 0 {
        bail!("--workers must be greater than 0");
    }
    let config = config.normalized().context("Invalid grid configuration")?;
    let path = path.context("Usage: flowgrid [options] <directory>")?;

    Ok(AppArgs {
        path,
        out,
        recursive,
        workers,
        cache_mb,
        config,
        events,
    })
}

/// Applies a layout/viewport flag to `config`. Returns false for flags it
/// does not know.
pub(crate) fn parse_grid_flag<I>(flag: &str, args: &mut I, config: &mut GridConfig) -> Result<bool>
where
    I: Iterator<Item = String>,
{
    match flag {
        "--width" => config.viewport_width = next_value(flag, args)?,
        "--height" => config.viewport_height = next_value(flag, args)?,
        "--padding" => config.padding = next_value(flag, args)?,
        "--threshold" => config.line_break_threshold = next_value(flag, args)?,
        "--max-tile-height" => config.max_tile_height = next_value(flag, args)?,
        "--max-tile-width" => config.max_tile_width = next_value(flag, args)?,
        "--zoom" => config.zoom_factor = next_value(flag, args)?,
        "--overscan" => config.overscan_ratio = next_value(flag, args)?,
        "--cull" => {
            config.cull_mode = match next_value::<String>(flag, args)?.as_str() {
                "bottom-edge" => CullMode::BottomEdge,
                "intersects" => CullMode::Intersects,
                other => bail!("Unknown --cull mode: {}", other),
            }
        }
        "--damping" => config.zoom_damping = parse_damping(&next_value::<String>(flag, args)?)?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_damping(value: &str) -> Result<ZoomDamping> {
    let damping = match value.split_once(':') {
        None if value == "none" => ZoomDamping::None,
        None if value == "alternate" => ZoomDamping::Alternate,
        Some(("interval", ms)) => ZoomDamping::MinInterval(Duration::from_millis(
            ms.parse().context("Failed to parse --damping interval in ms")?,
        )),
        Some(("smooth", exponent)) => ZoomDamping::Smoothing {
            exponent: exponent
                .parse()
                .context("Failed to parse --damping smoothing exponent")?,
        },
        _ => bail!(
            "Unknown --damping policy {:?} (none, alternate, interval:<ms>, smooth:<exp>)",
            value
        ),
    };
    Ok(damping)
}

pub(crate) fn next_value<T>(flag: &str, args: &mut impl Iterator<Item = String>) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = args
        .next()
        .with_context(|| format!("Missing value for {}", flag))?;
    value
        .parse::<T>()
        .with_context(|| format!("Failed to parse {} value {:?}", flag, value))
}

fn parse_list(flag: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(|item| {
            item.trim()
                .parse::<f64>()
                .with_context(|| format!("Failed to parse {} item {:?}", flag, item))
        })
        .collect()
}

/// Prints clicked tiles and remembers the last one.
#[derive(Debug, Default)]
struct SelectionLog {
    last: Option<MediaId>,
}

impl SelectionSink for SelectionLog {
    fn on_selected(&mut self, x: f64, y: f64, tile: &Tile) {
        info!(x, y, id = %tile.id, row = tile.row_position, "Tile selected");
        println!("selected {} at ({}, {})", tile.id, x, y);
        self.last = Some(tile.id.clone());
    }
}

/// Owns the running grid and writes frames.
struct Session {
    engine: LayoutEngine,
    renderer: GridRenderer<FsMediaProvider>,
    canvas: RgbaCanvas,
    out: PathBuf,
    frame: usize,
}

impl Session {
    fn render(&mut self, offset: f64) -> Result<FrameStats> {
        let stats = self.renderer.render(&self.engine, offset, &mut self.canvas);

        let deadline = Instant::now() + SETTLE_TIMEOUT;
        while self.renderer.pending_count() > 0 && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
            self.renderer
                .poll_completions(&self.engine, offset, &mut self.canvas);
        }

        let path = self.out.join(format!("frame_{:03}.png", self.frame));
        self.canvas.save(&path)?;
        debug!(
            frame = self.frame,
            offset,
            drawn = stats.drawn,
            placeholders = stats.placeholders,
            "Wrote frame"
        );
        println!("frame {} offset={:.1} -> {}", self.frame, offset, path.display());
        self.frame += 1;
        Ok(stats)
    }

    fn render_committed(&mut self) -> Result<FrameStats> {
        let offset = self.engine.viewport().offset;
        self.render(offset)
    }
}

pub fn run(args: AppArgs) -> Result<i32> {
    let started = Instant::now();
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {:?}", args.out))?;

    let scanner = FileScanner::with_config(ScanConfig {
        recursive: args.recursive,
        ..ScanConfig::default()
    });
    let ids = scanner.media_ids(&args.path)?;

    let provider = Arc::new(
        FsMediaProvider::new(args.workers, ImageCache::new(args.cache_mb))
            .context("Failed to start decode workers")?,
    );
    let probe = ProbePool::new(
        args.workers,
        args.config.max_tile_width,
        args.config.max_tile_height,
    );
    let tiles = probe.probe(&*provider, ids);
    let engine = LayoutEngine::with_tiles(args.config.clone(), tiles)
        .context("Invalid grid configuration")?;

    let snapshot = engine.snapshot();
    info!(
        path = ?args.path,
        tiles = snapshot.tile_count(),
        rows = snapshot.rows.len(),
        content_height = snapshot.content_height(),
        "Grid ready"
    );

    let mut session = Session {
        engine,
        renderer: GridRenderer::new(Arc::clone(&provider)),
        canvas: RgbaCanvas::new(
            args.config.viewport_width.round() as u32,
            args.config.viewport_height.round() as u32,
        ),
        out: args.out.clone(),
        frame: 0,
    };
    session.render_committed()?;
    replay(&mut session, &args.events)?;

    info!(
        frames = session.frame,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(0)
}

fn replay(session: &mut Session, events: &[InputEvent]) -> Result<()> {
    let mut selection = SelectionLog::default();
    let mut in_gesture = false;

    for event in events {
        if in_gesture && !matches!(event, InputEvent::Pinch(_)) {
            session.engine.end_zoom_gesture();
            in_gesture = false;
        }

        match *event {
            InputEvent::Scroll(delta) => match session.engine.scroll(delta) {
                ScrollOutcome::Scrolled { offset } | ScrollOutcome::Overscroll {
                    render_offset: offset,
                } => {
                    session.render(offset)?;
                }
                ScrollOutcome::Suppressed => debug!(delta, "Scroll suppressed"),
            },
            InputEvent::Pinch(factor) => {
                in_gesture = true;
                if session.engine.apply_zoom_gesture(factor, Instant::now()) {
                    session.renderer.cancel_offscreen(
                        &session.engine,
                        session.engine.viewport().offset,
                    );
                    session.render_committed()?;
                }
            }
            InputEvent::Click(x, y) => {
                let previous = selection.last.take();
                match session.engine.click(x, y, &mut selection) {
                    Some(id) => {
                        if let Some(previous) = previous.filter(|prev| prev != &id) {
                            session.engine.set_selected(&previous, false);
                        }
                        session.engine.set_selected(&id, true);
                    }
                    None => {
                        selection.last = previous;
                        println!("no tile at ({}, {})", x, y);
                    }
                }
            }
        }
    }

    if in_gesture {
        session.engine.end_zoom_gesture();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults() {
        let parsed = parse_args(args(&["/photos"])).unwrap();
        assert_eq!(parsed.path, PathBuf::from("/photos"));
        assert_eq!(parsed.config, GridConfig::default());
        assert!(parsed.events.is_empty());
        assert!(!parsed.recursive);
    }

    #[test]
    fn test_parse_args_events_keep_order() {
        let parsed = parse_args(args(&[
            "--scroll",
            "-300,-300",
            "--click",
            "10,20",
            "--pinch",
            "1.1",
            "/photos",
        ]))
        .unwrap();
        assert_eq!(
            parsed.events,
            vec![
                InputEvent::Scroll(-300.0),
                InputEvent::Scroll(-300.0),
                InputEvent::Click(10.0, 20.0),
                InputEvent::Pinch(1.1),
            ]
        );
    }

    #[test]
    fn test_parse_args_grid_flags() {
        let parsed = parse_args(args(&[
            "--width",
            "800",
            "--padding",
            "6",
            "--zoom",
            "9",
            "--cull",
            "intersects",
            "--damping",
            "interval:50",
            "dir",
        ]))
        .unwrap();
        assert_eq!(parsed.config.viewport_width, 800.0);
        assert_eq!(parsed.config.padding, 6.0);
        assert_eq!(parsed.config.zoom_factor, 1.5);
        assert_eq!(parsed.config.cull_mode, CullMode::Intersects);
        assert_eq!(
            parsed.config.zoom_damping,
            ZoomDamping::MinInterval(Duration::from_millis(50))
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--padding"])).is_err());
        assert!(parse_args(args(&["--padding", "-1", "dir"])).is_err());
        assert!(parse_args(args(&["--click", "1", "dir"])).is_err());
        assert!(parse_args(args(&["--bogus", "dir"])).is_err());
        assert!(parse_args(args(&["--damping", "wobbly", "dir"])).is_err());
        assert!(parse_args(args(&["--damping", "smooth:NaN", "dir"])).is_err());
    }

    #[test]
    fn test_run_writes_frames() {
        let media = tempdir().unwrap();
        for (name, w, h) in [("a.png", 40, 20), ("b.png", 20, 40), ("c.png", 30, 30)] {
            RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 255]))
                .save(media.path().join(name))
                .unwrap();
        }
        std::fs::write(media.path().join("broken.png"), b"nope").unwrap();

        let out = tempdir().unwrap();
        let mut parsed = parse_args(args(&[
            "--width", "200", "--height", "120", "--scroll", "-40", "--click", "5,5",
        ])
        .into_iter()
        .chain([media.path().to_string_lossy().into_owned()]))
        .unwrap();
        parsed.out = out.path().join("frames");
        parsed.workers = 1;

        assert_eq!(run(parsed).unwrap(), 0);
        assert!(out.path().join("frames/frame_000.png").exists());
    }
}
