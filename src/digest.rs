//! SHA-256 helpers shared by the remote and local sides of the pipeline.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Fixed read buffer for streaming file hashes.
pub const READ_BUFFER_SIZE: usize = 8192;

/// SHA-256 of the empty input.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hex-encoded SHA-256 of an in-memory buffer.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stream a reader through SHA-256 without holding more than one buffer.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Streaming SHA-256 of a file on disk. Symlinks are followed.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    hash_reader(file)
}

/// Combine per-file digests into one directory digest.
///
/// Each digest is written as its own `\n`-terminated line and the resulting
/// text is hashed. The caller supplies the order; both sides of a transfer
/// must iterate their digests sorted by relative path.
pub fn combine_digests<'a, I>(digests: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for digest in digests {
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Extract the digest from `sha256sum`-style output.
///
/// The first whitespace-delimited token must be 64 hex characters; it is
/// returned lowercased.
pub fn parse_digest_token(output: &str) -> Option<String> {
    let token = output.split_whitespace().next()?;
    // sha256sum escapes names containing a backslash or newline with a leading '\'
    let token = token.strip_prefix('\\').unwrap_or(token);
    if token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(token.to_ascii_lowercase())
    } else {
        None
    }
}
