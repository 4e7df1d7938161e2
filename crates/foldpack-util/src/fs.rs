use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    // Same directory so the rename stays on one filesystem
    let mut temp_path = parent.to_path_buf();
    temp_path.push(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Windows refuses to rename over an existing file.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// Recursively copy the contents of `src` into `dest`.
///
/// `dest` is created if missing. Existing files are overwritten. Symlinks are
/// followed, so the copy always contains regular files.
///
/// Returns the number of files copied.
///
/// # Errors
/// Returns an error if `src` is not a directory or any entry fails to copy.
pub fn copy_dir_all(src: &Path, dest: &Path) -> io::Result<usize> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", src.display()),
        ));
    }

    fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove a directory tree if it exists. Missing directories are not an error.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
