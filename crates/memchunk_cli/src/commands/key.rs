//! Key command implementation.

use memchunk_core::{encoder_for, BackendKind};
use serde::Serialize;

/// Physical keys derived from one logical key.
#[derive(Debug, Serialize)]
pub struct KeyReport {
    /// Logical key as given.
    pub logical: String,
    /// Backend routing behavior.
    pub backend: String,
    /// Physical key of chunk 0.
    pub physical: String,
    /// Physical keys of chunks 1 and up.
    pub chunks: Vec<String>,
    /// Physical key of the lock entry.
    pub lock: String,
}

/// Builds the key report for `key`.
pub fn report(key: &str, backend: BackendKind, prefix: &str, chunks: u32) -> KeyReport {
    let encoder = encoder_for(backend, prefix);
    KeyReport {
        logical: key.to_string(),
        backend: format!("{backend:?}"),
        physical: encoder.encode(key),
        chunks: (1..chunks).map(|i| encoder.chunk_key(key, i)).collect(),
        lock: encoder.lock_key(key),
    }
}

/// Runs the key command.
pub fn run(
    key: &str,
    backend: BackendKind,
    prefix: &str,
    chunks: u32,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = report(key, backend, prefix, chunks);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Logical:  {}", result.logical);
            println!("Backend:  {}", result.backend);
            println!("Physical: {}", result.physical);
            for (i, chunk) in result.chunks.iter().enumerate() {
                println!("Chunk {}:  {}", i + 1, chunk);
            }
            println!("Lock:     {}", result.lock);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_hashing_report() {
        let result = report("user:1", BackendKind::SelfHashing, "app:", 3);
        assert_eq!(result.physical, "user:1");
        assert_eq!(result.chunks, vec!["user:1_s1", "user:1_s2"]);
        assert_eq!(result.lock, "user:1_lock");
    }

    #[test]
    fn external_hashing_report() {
        let result = report("user:1", BackendKind::ExternalHashing, "app:", 1);
        assert_eq!(result.physical.len(), 32);
        assert!(result.chunks.is_empty());
        assert_ne!(result.lock, result.physical);
    }
}
