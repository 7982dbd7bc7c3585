//! Atomic file output.
//!
//! Content is written to a uniquely named temporary file in the destination
//! directory and renamed over the destination only after it was completely
//! written. Readers see either the previous file or the new one, never a
//! prefix. If the writer fails, or the process dies before the rename, the
//! destination is untouched; the temporary file is removed on every failure
//! path this process survives, and its name (`.<dest>.<random>.tmp`) never
//! looks like a source or an output to the walker.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::{RenderError, Result};

/// Write `dest` atomically, optionally gzip-compressing what `write` produces.
///
/// Returns the size in bytes of the committed file.
pub fn write_atomically<F>(dest: &Path, gzip: Option<Compression>, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            RenderError::io(
                dest,
                io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
            )
        })?;

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| RenderError::io(dir, source))?;

    let result = (|| -> io::Result<u64> {
        let mut out = BufWriter::new(temp.as_file_mut());
        match gzip {
            Some(level) => {
                let mut encoder = GzEncoder::new(&mut out, level);
                write(&mut encoder)?;
                encoder.finish()?;
            }
            None => write(&mut out)?,
        }
        out.flush()?;
        drop(out);
        set_readable(temp.as_file())?;
        Ok(temp.as_file().metadata()?.len())
    })();
    let written = result.map_err(|source| RenderError::io(temp.path(), source))?;

    temp.persist(dest)
        .map_err(|err| RenderError::io(dest, err.error))?;
    Ok(written)
}

#[cfg(unix)]
fn set_readable(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
