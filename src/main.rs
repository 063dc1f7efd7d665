use anyhow::Result;
use std::time::Instant;
use std::fs::File;
use std::io::Write;
use log::{info, warn, error, debug};

// Define modules used by main
mod agent;
mod avoidance;
mod simulation;

use dronesim_common::{SimulationConfig, SimulationRecord};
use simulation::Simulation;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Drone Waypoint Simulation Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;

    // --- Initialize Simulation ---
    info!("Initializing simulation state...");
    let mut sim = Simulation::new(&config)?;
    info!(
        "Initialized {} agents (primary id {}, {} others).",
        sim.agents().len(),
        config.primary.id,
        config.others.len()
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    let params = sim.params().clone();

    // --- Simulation Loop ---
    info!(
        "Starting simulation loop (dt = {:.3}s, primary deadline = {:.2}s)...",
        params.dt, params.deadline
    );
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    while !sim.is_complete() {
        if sim.frame() >= params.max_frames {
            error!(
                "Reached timing.max_frames ({}) before all agents finished their paths.",
                params.max_frames
            );
            anyhow::bail!("Simulation did not terminate within timing.max_frames frames.");
        }
        sim.step()?;

        // Print status periodically
        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        if current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs {
            let finished = sim.agents().iter().filter(|a| a.reached()).count();
            info!(
                "Frame {} ({:.2}s simulated) | Agents finished: {}/{} | Pauses so far: {}{}",
                sim.frame(),
                sim.sim_time(),
                finished,
                sim.agents().len(),
                sim.record().pauses.len(),
                if sim.is_paused() { " | primary paused" } else { "" }
            );
            previous_print_time = current_time;
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished after {} frames ({:.2}s simulated) in {:.3} seconds.",
        sim.frame(),
        sim.sim_time(),
        total_duration.as_secs_f64()
    );

    let record = sim.into_record();

    // --- Pause Summary ---
    if record.pauses.is_empty() {
        info!("No pause events were triggered.");
    } else {
        info!("Pause events (time, other agent):");
        for event in &record.pauses {
            info!(
                "  - t={:.2}s  paused by predicted encounter with agent {} (frame {})",
                event.time, event.other_id, event.frame
            );
        }
    }

    // --- Save Recorded Data ---
    if config.output.save_record {
        let requested_format = config.output.format.as_deref().unwrap_or("json");
        let output_format = match requested_format {
            "json" | "bincode" | "messagepack" => requested_format,
            _ => {
                error!("Unknown output format: {}. Using JSON instead.", requested_format);
                "json"
            }
        };
        save_record(&record, &config.output.base_filename, output_format);
    } else {
        info!("Skipping saving the record as per config (save_record is false).");
    }

    // --- Save Pause Events (CSV) ---
    if config.output.save_pauses {
        let filename = format!("{}_pauses.csv", config.output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["time_s", "other_id", "frame"])?;
                for event in &record.pauses {
                    writer.write_record(&[
                        format!("{:.4}", event.time),
                        event.other_id.to_string(),
                        event.frame.to_string(),
                    ])?;
                }
                writer.flush()?;
                info!("Pause events saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    }

    // --- Save Final Positions (CSV) ---
    if config.output.save_positions {
        let filename = format!("{}_final_positions.csv", config.output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["agent_id", "x", "y", "z"])?;
                for track in &record.tracks {
                    if let Some(position) = track.positions.last() {
                        writer.write_record(&[
                            track.id.to_string(),
                            format!("{:.4}", position.x),
                            format!("{:.4}", position.y),
                            format!("{:.4}", position.z),
                        ])?;
                    } else {
                        warn!("Agent {} has an empty track; skipping.", track.id);
                    }
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Writes the recorded dataset in the configured serialization format.
fn save_record(record: &SimulationRecord, base_filename: &str, format: &str) {
    match format {
        "bincode" => {
            // Binary format (much more compact)
            let filename = format!("{}_record.bin", base_filename);
            match File::create(&filename) {
                Ok(file) => match bincode::serialize_into(file, record) {
                    Ok(_) => info!("Record saved to {} (binary format)", filename),
                    Err(e) => error!("Error serializing record to bincode: {}", e),
                },
                Err(e) => error!("Error creating record file '{}': {}", filename, e),
            }
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let filename = format!("{}_record.msgpack", base_filename);
            match &mut File::create(&filename) {
                Ok(file) => match rmp_serde::encode::write(file, record) {
                    Ok(_) => info!("Record saved to {} (MessagePack format)", filename),
                    Err(e) => error!("Error serializing record to MessagePack: {}", e),
                },
                Err(e) => error!("Error creating record file '{}': {}", filename, e),
            }
        }
        _ => {
            let filename = format!("{}_record.json", base_filename);
            match File::create(&filename) {
                Ok(mut file) => match serde_json::to_string(record) {
                    Ok(json_string) => {
                        if let Err(e) = file.write_all(json_string.as_bytes()) {
                            error!("Error writing record JSON to file '{}': {}", filename, e);
                        } else {
                            info!("Record saved to {} ({} frames)", filename, record.frame_count());
                        }
                    }
                    Err(e) => error!("Error serializing record to JSON: {}", e),
                },
                Err(e) => error!("Error creating record file '{}': {}", filename, e),
            }
        }
    }
}
