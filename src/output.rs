//! Writing retrieved files to disk.
//!
//! Data goes to a `.part` sibling first and is renamed into place once it
//! is fully written, so a failed write never leaves a truncated file under
//! the final name.

use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where a requested server path is saved: its final component inside
/// `output_dir`. Paths without a usable file name (`""`, `".."`, `"/"`)
/// have no local destination.
pub fn output_path(output_dir: &Path, requested: &str) -> Option<PathBuf> {
    Path::new(requested).file_name().map(|name| output_dir.join(name))
}

/// Creates (or truncates) `path` and wraps it in a buffered writer.
pub fn create_file_bufwriter(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    Ok(BufWriter::new(file))
}

/// Saves `data` for `requested` under `output_dir` and returns the final path.
/// An empty `data` produces an empty file.
pub fn write_output(output_dir: &Path, requested: &str, data: &[u8]) -> io::Result<PathBuf> {
    let target = output_path(output_dir, requested).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{:?} has no file name to save under", requested),
        )
    })?;

    let mut part_name = target.as_os_str().to_owned();
    part_name.push(".part");
    let part = PathBuf::from(part_name);

    let result = write_and_sync(&part, data).and_then(|_| fs::rename(&part, &target));
    if let Err(e) = result {
        let _ = fs::remove_file(&part);
        return Err(e);
    }

    debug!("Wrote {} bytes to {:?}", data.len(), target);
    Ok(target)
}

fn write_and_sync(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut writer = create_file_bufwriter(path)?;
    writer.write_all(data)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
