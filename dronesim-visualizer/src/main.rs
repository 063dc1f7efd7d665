use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use plotters::prelude::*;
use dronesim_common::{SimulationRecord, Vec3};
use std::fs::{self, File};
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input record file path (.json or .bin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output image path for the summary chart
    #[arg(short, long, default_value = "trajectories.png")]
    output: PathBuf,

    /// Also render a per-frame PNG sequence into this directory
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Render every Nth frame when producing the sequence
    #[arg(long, default_value_t = 5)]
    frame_stride: usize,

    /// Width of the output images in pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Height of the output images in pixels
    #[arg(long, default_value_t = 768)]
    height: u32,
}

/// Axis ranges covering every recorded position, with a little padding.
struct WorldBounds {
    x: Range<f32>,
    y: Range<f32>,
    z: Range<f32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Loading record from {}...", args.input.display());
    let record = load_record(&args.input)?;
    let n_frames = record.frame_count();
    if n_frames == 0 {
        anyhow::bail!("Record contains no frames.");
    }
    info!(
        "Record: {} agents, {} frames ({:.1}s simulated), {} pause events.",
        record.tracks.len(),
        n_frames,
        n_frames as f32 * record.dt,
        record.pauses.len()
    );
    for event in &record.pauses {
        info!(
            "[t={:.2}s] pause due to agent {} (frame {})",
            event.time, event.other_id, event.frame
        );
    }

    let bounds = world_bounds(&record);

    render_chart(&record, &bounds, n_frames, &args.output, (args.width, args.height))?;
    info!("Summary chart saved to {}", args.output.display());

    if let Some(frames_dir) = &args.frames_dir {
        fs::create_dir_all(frames_dir)
            .with_context(|| format!("Failed to create frames directory '{}'", frames_dir.display()))?;
        let stride = args.frame_stride.max(1);
        let frames: Vec<usize> = (0..n_frames).step_by(stride).collect();

        let bar = ProgressBar::new(frames.len() as u64);
        bar.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({eta})",
        )?);
        for &frame in &frames {
            let path = frames_dir.join(format!("frame_{:05}.png", frame));
            render_chart(&record, &bounds, frame + 1, &path, (args.width, args.height))?;
            bar.inc(1);
        }
        bar.finish();
        info!("Rendered {} frame charts into {}", frames.len(), frames_dir.display());
    }

    Ok(())
}

/// Loads a recorded run, choosing the decoder by file extension.
fn load_record(path: &Path) -> Result<SimulationRecord> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let file = File::open(path)
        .with_context(|| format!("Failed to open record file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    match extension {
        "bin" => bincode::deserialize_from(reader)
            .with_context(|| format!("Failed to decode bincode record '{}'", path.display())),
        "json" => serde_json::from_reader(reader)
            .with_context(|| format!("Failed to decode JSON record '{}'", path.display())),
        other => anyhow::bail!(
            "Unsupported record extension '{}'. Expected .json or .bin.",
            other
        ),
    }
}

fn world_bounds(record: &SimulationRecord) -> WorldBounds {
    let mut min = Vec3::new(f32::MAX, f32::MAX, f32::MAX);
    let mut max = Vec3::new(f32::MIN, f32::MIN, f32::MIN);
    for track in &record.tracks {
        for p in &track.positions {
            min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
    }
    // Pad by 5% of the largest extent so markers at the edge stay visible.
    let extent = (max.x - min.x).max(max.y - min.y).max(max.z - min.z).max(1.0);
    let pad = extent * 0.05;
    WorldBounds {
        x: (min.x - pad)..(max.x + pad),
        y: (min.y - pad)..(max.y + pad),
        z: (min.z - pad)..(max.z + pad),
    }
}

/// Draws trajectories up to (excluding) frame `upto` into a PNG chart.
fn render_chart(
    record: &SimulationRecord,
    bounds: &WorldBounds,
    upto: usize,
    path: &Path,
    (width, height): (u32, u32),
) -> Result<()> {
    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let time = (upto.saturating_sub(1)) as f32 * record.dt;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Agent trajectories (t = {:.1}s)", time), ("sans-serif", 24))
        .margin(10)
        .build_cartesian_3d(bounds.x.clone(), bounds.y.clone(), bounds.z.clone())?;
    chart.configure_axes().draw()?;

    for (idx, track) in record.tracks.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        let drawn = upto.min(track.positions.len());
        if drawn == 0 {
            warn!("Agent {} has an empty track; skipping.", track.id);
            continue;
        }

        let velocity = track.velocities[drawn - 1];
        chart
            .draw_series(LineSeries::new(
                track.positions[..drawn].iter().map(|p| (p.x, p.y, p.z)),
                &color,
            ))?
            .label(format!("agent {} ({:.2} m/s)", track.id, velocity))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));

        // Marker for the agent itself at the most recent drawn position.
        let position = track.positions[drawn - 1];
        chart.draw_series(std::iter::once(Circle::new(
            (position.x, position.y, position.z),
            4,
            color.filled(),
        )))?;
    }

    // Predicted collision points recorded up to this frame.
    let collision_points: Vec<&Vec3> = record
        .collisions
        .range(..upto as u32)
        .flat_map(|(_, points)| points.iter())
        .collect();
    chart.draw_series(
        collision_points
            .iter()
            .map(|p| Cross::new((p.x, p.y, p.z), 6, RED.stroke_width(2))),
    )?;

    // Most recent pause notices, overlaid in the top-left corner.
    let triggered: Vec<_> = record
        .pauses
        .iter()
        .filter(|e| (e.frame as usize) < upto)
        .collect();
    for (i, event) in triggered.iter().rev().take(3).enumerate() {
        root.draw(&Text::new(
            format!("[t={:.2}s] pause due to agent {}", event.time, event.other_id),
            (15, 40 + 18 * i as i32),
            ("sans-serif", 14).into_font().color(&BLACK),
        ))?;
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;
    root.present()?;
    Ok(())
}
