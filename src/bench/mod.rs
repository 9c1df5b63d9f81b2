use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

use crate::app::{next_value, parse_grid_flag};
use crate::config::{GridConfig, MAX_ZOOM, MIN_ZOOM};
use crate::layout::LayoutEngine;
use crate::media::{FsMediaProvider, ImageCache, ProbePool};
use crate::models::{MediaId, Tile};
use crate::scanner::{FileScanner, ScanConfig};

/// Tiles generated when no directory is given.
const DEFAULT_SYNTHETIC_TILES: usize = 10_000;

/// Zoom steps measured per run.
const ZOOM_STEPS: usize = 14;

#[derive(Debug, Clone)]
pub struct BenchmarkArgs {
    pub path: Option<PathBuf>,
    pub runs: usize,
    pub synthetic: usize,
    pub recursive: bool,
    pub workers: usize,
    pub config: GridConfig,
}

#[derive(Debug)]
struct BenchmarkRun {
    run_index: usize,
    tiles: usize,
    rows: usize,
    content_height: f64,
    layout_ms: f64,
    scroll_frames: usize,
    cull_p50_ms: f64,
    cull_p95_ms: f64,
    visible_avg: f64,
    zoom_relayouts: usize,
    zoom_p50_ms: f64,
    zoom_p95_ms: f64,
    frames_over_16ms: usize,
}

#[derive(Debug)]
struct BenchmarkAggregate {
    runs: usize,
    avg_layout_ms: f64,
    min_layout_ms: f64,
    max_layout_ms: f64,
    avg_cull_p95_ms: f64,
    avg_zoom_p95_ms: f64,
}

#[derive(Debug)]
struct BenchmarkReport {
    schema_version: u32,
    generated_at_unix_ms: u128,
    source: String,
    probe_ms: f64,
    unavailable_tiles: usize,
    viewport_width: f64,
    viewport_height: f64,
    results: Vec<BenchmarkRun>,
    aggregate: BenchmarkAggregate,
}

pub fn maybe_parse_args() -> Result<Option<BenchmarkArgs>> {
    parse_args(env::args().skip(1))
}

fn parse_args<I>(args: I) -> Result<Option<BenchmarkArgs>>
where
    I: IntoIterator<Item = String>,
{
    let mut benchmark = false;
    let mut path: Option<PathBuf> = None;
    let mut runs: usize = 3;
    let mut synthetic: usize = DEFAULT_SYNTHETIC_TILES;
    let mut recursive = false;
    let mut workers: usize = 4;
    let mut config = GridConfig::default();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if parse_grid_flag(&arg, &mut args, &mut config)? {
            continue;
        }
        match arg.as_str() {
            "--benchmark" => benchmark = true,
            "--path" => path = Some(next_value(&arg, &mut args)?),
            "--runs" => runs = next_value(&arg, &mut args)?,
            "--synthetic" => synthetic = next_value(&arg, &mut args)?,
            "--workers" => workers = next_value(&arg, &mut args)?,
            "--recursive" => recursive = true,
            _ => {
                if path.is_none() && !arg.starts_with('-') {
                    path = Some(PathBuf::from(&arg));
                }
            }
        }
    }

    if !benchmark {
        return Ok(None);
    }
    if runs == 0 {
        bail!("--runs must be greater than 0");
    }
    if workers == 0 {
        bail!("--workers must be greater than 0");
    }
    if path.is_none() && synthetic == 0 {
        bail!("Benchmark mode requires a directory or --synthetic <count>");
    }
    let config = config
        .normalized()
        .context("Invalid grid configuration for benchmark")?;

    Ok(Some(BenchmarkArgs {
        path,
        runs,
        synthetic,
        recursive,
        workers,
        config,
    }))
}

pub fn run_benchmark(args: BenchmarkArgs) -> Result<i32> {
    let probe_start = Instant::now();
    let (tiles, source) = match &args.path {
        Some(path) => {
            println!("phase=probe start path={}", path.display());
            let ids = FileScanner::with_config(ScanConfig {
                recursive: args.recursive,
                ..ScanConfig::default()
            })
            .media_ids(path)?;
            let provider = FsMediaProvider::new(1, ImageCache::default())
                .context("Failed to start media provider")?;
            let pool = ProbePool::new(
                args.workers,
                args.config.max_tile_width,
                args.config.max_tile_height,
            );
            (pool.probe(&provider, ids), path.display().to_string())
        }
        None => (
            synthetic_tiles(args.synthetic, 0x9E37_79B9_7F4A_7C15),
            format!("synthetic:{}", args.synthetic),
        ),
    };
    let probe_ms = probe_start.elapsed().as_secs_f64() * 1000.0;
    let unavailable_tiles = tiles.iter().filter(|tile| tile.unavailable).count();
    println!(
        "phase=probe done tiles={} unavailable={} ms={:.2}",
        tiles.len(),
        unavailable_tiles,
        probe_ms
    );
    if tiles.is_empty() {
        bail!("No media to lay out in {}", source);
    }

    let mut runs = Vec::with_capacity(args.runs);
    for run_index in 0..args.runs {
        println!("run={} phase=begin", run_index + 1);
        let run = run_once(run_index, &args.config, tiles.clone())?;
        println!(
            "run={} phase=done rows={} layout_ms={:.3} cull_p95_ms={:.3} zoom_p95_ms={:.3} over16={}",
            run_index + 1,
            run.rows,
            run.layout_ms,
            run.cull_p95_ms,
            run.zoom_p95_ms,
            run.frames_over_16ms
        );
        runs.push(run);
    }

    let report = BenchmarkReport {
        schema_version: 1,
        generated_at_unix_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0),
        source,
        probe_ms,
        unavailable_tiles,
        viewport_width: args.config.viewport_width,
        viewport_height: args.config.viewport_height,
        aggregate: build_aggregate(&runs),
        results: runs,
    };

    let output_dir = PathBuf::from("target/flowgrid-bench");
    fs::create_dir_all(&output_dir).context("Failed to create benchmark output directory")?;
    let report_path = output_dir.join("report.json");
    fs::write(&report_path, render_report_json(&report))
        .with_context(|| format!("Failed to write benchmark report: {:?}", report_path))?;
    println!("report={}", report_path.display());

    Ok(0)
}

fn run_once(run_index: usize, config: &GridConfig, tiles: Vec<Tile>) -> Result<BenchmarkRun> {
    let tile_count = tiles.len();
    let layout_start = Instant::now();
    let mut engine = LayoutEngine::with_tiles(config.clone(), tiles)?;
    let layout_ms = layout_start.elapsed().as_secs_f64() * 1000.0;

    let snapshot = engine.snapshot();
    let rows = snapshot.rows.len();
    let content_height = snapshot.content_height();

    // Scroll top to bottom a quarter viewport at a time, timing the cull.
    let step = config.viewport_height / 4.0;
    let mut cull_times_ms = Vec::new();
    let mut visible_counts = Vec::new();
    loop {
        let frame_start = Instant::now();
        let visible = engine.visible_tiles();
        cull_times_ms.push(frame_start.elapsed().as_secs_f64() * 1000.0);
        visible_counts.push(visible.len() as f64);

        let before = engine.viewport().offset;
        engine.scroll(-step);
        if engine.viewport().offset == before {
            break;
        }
    }

    // Sweep the zoom range, timing each full re-layout.
    let mut zoom_times_ms = Vec::with_capacity(ZOOM_STEPS);
    for i in 0..ZOOM_STEPS {
        let zoom = MIN_ZOOM + (MAX_ZOOM - MIN_ZOOM) * i as f64 / (ZOOM_STEPS - 1) as f64;
        let zoom_start = Instant::now();
        engine.set_zoom(zoom)?;
        zoom_times_ms.push(zoom_start.elapsed().as_secs_f64() * 1000.0);
    }

    let frames_over_16ms = cull_times_ms
        .iter()
        .chain(&zoom_times_ms)
        .filter(|t| **t > 16.67)
        .count();

    Ok(BenchmarkRun {
        run_index,
        tiles: tile_count,
        rows,
        content_height,
        layout_ms,
        scroll_frames: cull_times_ms.len(),
        cull_p50_ms: percentile_ms(&cull_times_ms, 0.50),
        cull_p95_ms: percentile_ms(&cull_times_ms, 0.95),
        visible_avg: average(&visible_counts),
        zoom_relayouts: zoom_times_ms.len(),
        zoom_p50_ms: percentile_ms(&zoom_times_ms, 0.50),
        zoom_p95_ms: percentile_ms(&zoom_times_ms, 0.95),
        frames_over_16ms,
    })
}

/// Deterministic tiles with aspect ratios between roughly 0.5 and 2.5.
fn synthetic_tiles(count: usize, seed: u64) -> Vec<Tile> {
    let mut state = seed.max(1);
    (0..count)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let aspect = 0.5 + (state % 2000) as f64 / 1000.0;
            let height = 1000.0;
            Tile::new(
                MediaId::new(format!("synthetic-{:06}", i)),
                height * aspect,
                height,
            )
        })
        .collect()
}

fn build_aggregate(runs: &[BenchmarkRun]) -> BenchmarkAggregate {
    let layout_values: Vec<f64> = runs.iter().map(|r| r.layout_ms).collect();
    let cull_p95_values: Vec<f64> = runs.iter().map(|r| r.cull_p95_ms).collect();
    let zoom_p95_values: Vec<f64> = runs.iter().map(|r| r.zoom_p95_ms).collect();

    BenchmarkAggregate {
        runs: runs.len(),
        avg_layout_ms: average(&layout_values),
        min_layout_ms: layout_values.iter().copied().fold(f64::INFINITY, f64::min),
        max_layout_ms: layout_values.iter().copied().fold(0.0, f64::max),
        avg_cull_p95_ms: average(&cull_p95_values),
        avg_zoom_p95_ms: average(&zoom_p95_values),
    }
}

fn render_report_json(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!(
        "  \"schema_version\": {},\n",
        report.schema_version
    ));
    out.push_str(&format!(
        "  \"generated_at_unix_ms\": {},\n",
        report.generated_at_unix_ms
    ));
    out.push_str(&format!(
        "  \"source\": \"{}\",\n",
        escape_json(&report.source)
    ));
    out.push_str(&format!("  \"probe_ms\": {:.3},\n", report.probe_ms));
    out.push_str(&format!(
        "  \"unavailable_tiles\": {},\n",
        report.unavailable_tiles
    ));
    out.push_str(&format!(
        "  \"viewport\": {{ \"width\": {}, \"height\": {} }},\n",
        report.viewport_width, report.viewport_height
    ));

    out.push_str("  \"results\": [\n");
    for (i, run) in report.results.iter().enumerate() {
        out.push_str("    {\n");
        out.push_str(&format!("      \"run_index\": {},\n", run.run_index));
        out.push_str(&format!("      \"tiles\": {},\n", run.tiles));
        out.push_str(&format!("      \"rows\": {},\n", run.rows));
        out.push_str(&format!(
            "      \"content_height\": {:.1},\n",
            run.content_height
        ));
        out.push_str(&format!("      \"layout_ms\": {:.3},\n", run.layout_ms));
        out.push_str(&format!("      \"scroll_frames\": {},\n", run.scroll_frames));
        out.push_str(&format!("      \"cull_p50_ms\": {:.3},\n", run.cull_p50_ms));
        out.push_str(&format!("      \"cull_p95_ms\": {:.3},\n", run.cull_p95_ms));
        out.push_str(&format!("      \"visible_avg\": {:.1},\n", run.visible_avg));
        out.push_str(&format!(
            "      \"zoom_relayouts\": {},\n",
            run.zoom_relayouts
        ));
        out.push_str(&format!("      \"zoom_p50_ms\": {:.3},\n", run.zoom_p50_ms));
        out.push_str(&format!("      \"zoom_p95_ms\": {:.3},\n", run.zoom_p95_ms));
        out.push_str(&format!(
            "      \"frames_over_16ms\": {}\n",
            run.frames_over_16ms
        ));
        out.push_str("    }");
        if i + 1 < report.results.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("  ],\n");

    let agg = &report.aggregate;
    out.push_str("  \"aggregate\": {\n");
    out.push_str(&format!("    \"runs\": {},\n", agg.runs));
    out.push_str(&format!("    \"avg_layout_ms\": {:.3},\n", agg.avg_layout_ms));
    out.push_str(&format!("    \"min_layout_ms\": {:.3},\n", agg.min_layout_ms));
    out.push_str(&format!("    \"max_layout_ms\": {:.3},\n", agg.max_layout_ms));
    out.push_str(&format!(
        "    \"avg_cull_p95_ms\": {:.3},\n",
        agg.avg_cull_p95_ms
    ));
    out.push_str(&format!(
        "    \"avg_zoom_p95_ms\": {:.3}\n",
        agg.avg_zoom_p95_ms
    ));
    out.push_str("  }\n");
    out.push_str("}\n");
    out
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile_ms(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let clamped = p.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * clamped).round() as usize;
    sorted[idx]
}

fn escape_json(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
