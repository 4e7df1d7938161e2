use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Compute the BLAKE3 digest of a file, returning it hex-encoded.
///
/// Used to fingerprint the packed archive so two runs can be compared.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn blake3_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
