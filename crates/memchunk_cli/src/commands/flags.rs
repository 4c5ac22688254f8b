//! Flags command implementation.

use memchunk_codec::{Flags, RESERVED_BITS};
use serde::Serialize;

/// A decoded flags integer.
#[derive(Debug, Serialize)]
pub struct FlagsReport {
    /// Raw flags value.
    pub value: u32,
    /// Backend-owned low bits.
    pub backend_bits: u32,
    /// Whether the compression bit is set.
    pub compressed: bool,
    /// Additional chunks beyond chunk 0, if chunk metadata is present.
    pub part_count: Option<u32>,
}

/// Builds the report for a flags value.
pub fn report(value: u32) -> FlagsReport {
    let flags = Flags::decode(value);
    FlagsReport {
        value,
        backend_bits: value & ((1 << RESERVED_BITS) - 1),
        compressed: flags.compressed,
        part_count: flags.part_count,
    }
}

/// Runs `flags decode`.
pub fn decode(value: u32, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = report(value);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Value:        {:#010x} ({})", result.value, result.value);
            println!("Backend bits: {:#06x}", result.backend_bits);
            println!("Compressed:   {}", result.compressed);
            match result.part_count {
                Some(0) => println!("Chunks:       single"),
                Some(n) => println!("Chunks:       1 + {n}"),
                None => println!("Chunks:       no metadata"),
            }
        }
    }

    Ok(())
}

/// Runs `flags encode`.
pub fn encode(compressed: bool, parts: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let flags = Flags {
        compressed,
        part_count: parts,
    };
    println!("{}", flags.encode()?);
    Ok(())
}
