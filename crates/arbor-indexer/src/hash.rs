//! Content hashing for change detection

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 32 * 1024;

/// SHA-256 hex digest of a file, read in 32 KiB chunks with a cancellation
/// check between chunks.
pub fn compute_file_hash(cancel: &CancellationToken, path: &Path) -> anyhow::Result<String> {
    if cancel.is_cancelled() {
        bail!("hashing cancelled");
    }
    let mut file =
        File::open(path).with_context(|| format!("open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            bail!("hashing cancelled");
        }
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex(&hasher.finalize()))
}

/// SHA-256 hex digest of in-memory bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex(&Sha256::digest(bytes))
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
