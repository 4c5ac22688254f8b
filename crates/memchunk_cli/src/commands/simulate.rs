//! Simulate command implementation.
//!
//! Writes a value of the requested size through a client backed by an
//! in-memory pool, reads it back, and reports how it was laid out.

use memchunk_core::{BackendKind, Client, Config, InMemoryStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// Serialized value size in bytes.
    pub size: usize,
    /// Largest number of bytes per physical key.
    pub max_chunk_size: usize,
    /// Number of simulated servers.
    pub servers: u16,
    /// Backend routing behavior.
    pub backend: BackendKind,
    /// Whether values larger than one chunk may be split.
    pub large_items: bool,
}

/// Outcome of a simulation.
#[derive(Debug, Serialize)]
pub struct SimulateResult {
    /// Value size in bytes.
    pub size: usize,
    /// Whether the write was accepted.
    pub stored: bool,
    /// Physical keys written.
    pub chunks: usize,
    /// Round trips spent writing.
    pub write_round_trips: u64,
    /// Round trips spent reading back.
    pub read_round_trips: u64,
    /// Whether the value read back equals the value written.
    pub intact: bool,
}

/// Runs the simulation without printing anything.
pub fn simulate(options: &Options) -> Result<SimulateResult, Box<dyn std::error::Error>> {
    let store = Arc::new(InMemoryStore::new());
    let mut config = Config::new()
        .backend(options.backend)
        .max_chunk_size(options.max_chunk_size)
        .large_items(options.large_items);
    for i in 0..options.servers.max(1) {
        config = config.server(format!("server-{i}"), 11211);
    }
    let client = Client::open(config, store.clone())?;

    let value: Vec<u8> = (0..options.size).map(|i| (i % 251) as u8).collect();

    store.reset_counters();
    let stored = client.set_raw("simulated", &value, Duration::ZERO)?;
    let write_round_trips = store.round_trips();

    store.reset_counters();
    let read = client.get_raw("simulated")?;
    let read_round_trips = store.round_trips();

    info!(size = options.size, stored, chunks = store.len(), "simulation done");

    Ok(SimulateResult {
        size: options.size,
        stored,
        chunks: store.len(),
        write_round_trips,
        read_round_trips,
        intact: read.as_deref() == Some(value.as_slice()),
    })
}

/// Runs the simulate command.
pub fn run(options: &Options, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = simulate(options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Value size:         {} bytes", result.size);
            println!("Stored:             {}", result.stored);
            println!("Physical keys:      {}", result.chunks);
            println!("Write round trips:  {}", result.write_round_trips);
            println!("Read round trips:   {}", result.read_round_trips);
            println!("Read back intact:   {}", result.intact);
        }
    }

    Ok(())
}
