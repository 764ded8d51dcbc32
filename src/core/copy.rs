/*!
 * Copy/Move Engine (C4): bulk file copy and move with progress reporting.
 *
 * Destination resolution and the temp-file-then-rename overwrite discipline
 * follow `core/mod.rs`'s `copy_file` orchestration; the per-file attempt of
 * a reflink before falling back to a chunked read/write loop adapts
 * `core/inplace.rs`'s `try_reflink` (Linux FICLONE ioctl, macOS `clonefile`)
 * paired with `core/buffered.rs`'s buffered-copy shape. Metadata
 * preservation reuses `core/metadata.rs::preserve_metadata` almost as-is.
 * Move attempts `fs::rename` first and only falls back to copy-then-delete
 * on a cross-device error, the same two-tier strategy `core/mod.rs` uses
 * for same-filesystem moves.
 */

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use filetime::{set_file_times, FileTime};
use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::config::CopyOptions;
use crate::error::{Error, Result};

use super::pool::shared_pool;
use super::progress::{CopyProgressCallback, ProgressReporter};

/// Outcome of a `copy_files`/`move_files` call.
#[derive(Debug, Clone, Default)]
pub struct CopySummary {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub failed: Vec<(PathBuf, String)>,
}

struct PlannedTransfer {
    source: PathBuf,
    dest: PathBuf,
    size: u64,
}

/// Resolve `sources` against `dest` the way a single `cp`/`mv` invocation
/// would: one source and a non-existent destination names the new file
/// directly; otherwise `dest` is (or becomes) a directory and every source
/// lands inside it under its own basename. Colliding basenames across
/// distinct sources are rejected up front rather than silently clobbering
/// each other mid-copy.
fn resolve_destinations(sources: &[PathBuf], dest: &Path) -> Result<Vec<PlannedTransfer>> {
    let dest_is_dir = dest.is_dir();
    let single_file_target = sources.len() == 1 && !dest_is_dir && !dest.exists();

    let mut planned = Vec::with_capacity(sources.len());
    let mut seen_basenames = std::collections::HashSet::new();

    for source in sources {
        let meta = fs::symlink_metadata(source)
            .map_err(|_| Error::not_found(source.clone()))?;
        let size = meta.len();

        let target = if single_file_target {
            dest.to_path_buf()
        } else {
            let basename = source
                .file_name()
                .ok_or_else(|| Error::copy(format!("source {:?} has no file name", source)))?;
            if !seen_basenames.insert(basename.to_owned()) {
                return Err(Error::copy(format!(
                    "duplicate basename {:?} among sources targeting {:?}",
                    basename, dest
                )));
            }
            dest.join(basename)
        };

        planned.push(PlannedTransfer {
            source: source.clone(),
            dest: target,
            size,
        });
    }

    Ok(planned)
}

fn preserve_metadata(source: &Path, dest: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    fs::set_permissions(dest, metadata.permissions())?;
    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);
    set_file_times(dest, accessed, modified)?;
    Ok(())
}

fn copy_one_file(
    transfer: &PlannedTransfer,
    options: &CopyOptions,
    reporter: &ProgressReporter,
    cancellation: &CancellationToken,
) -> Result<u64> {
    cancellation.check()?;

    if transfer.dest.exists() && !options.overwrite {
        return Err(Error::copy(format!(
            "destination {:?} exists and overwrite is disabled",
            transfer.dest
        )));
    }

    if let Some(parent) = transfer.dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = if transfer.size >= options.reflink_threshold
        && try_reflink(&transfer.source, &transfer.dest).is_ok()
    {
        reporter.add_bytes(transfer.size);
        reporter.complete_file(&transfer.source);
        transfer.size
    } else {
        copy_via_temp_and_rename(transfer, options, reporter, cancellation)?
    };

    if options.preserve_metadata {
        preserve_metadata(&transfer.source, &transfer.dest)?;
    }

    Ok(bytes)
}

fn copy_via_temp_and_rename(
    transfer: &PlannedTransfer,
    options: &CopyOptions,
    reporter: &ProgressReporter,
    cancellation: &CancellationToken,
) -> Result<u64> {
    let tmp_path = transfer.dest.with_extension("driftwood-tmp");
    let mut src = File::open(&transfer.source)?;
    {
        let mut dst = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut buffer = vec![0u8; options.chunk_size];
        loop {
            cancellation.check().map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                e
            })?;

            let n = src.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            dst.write_all(&buffer[..n])?;
            reporter.report_bytes(&transfer.source, n as u64);
        }
        dst.flush()?;
    }

    fs::rename(&tmp_path, &transfer.dest)?;
    reporter.complete_file(&transfer.source);
    Ok(transfer.size)
}

/// Reject up front a batch that cancellation or an overwrite conflict would
/// doom entirely, so that whole-operation failures surface as `Err` instead
/// of being folded into a per-file summary. Per-file failures discovered
/// only once work is under way (a file vanishing mid-batch, permissions)
/// still collect into `CopySummary.failed`.
fn preflight(planned: &[PlannedTransfer], options: &CopyOptions, cancellation: &CancellationToken) -> Result<()> {
    cancellation.check()?;
    for transfer in planned {
        if transfer.dest.exists() && !options.overwrite {
            return Err(Error::copy(format!(
                "destination {:?} exists and overwrite is disabled",
                transfer.dest
            )));
        }
    }
    Ok(())
}

/// Copy every source into `dest`, reporting rate-limited progress on the
/// caller-supplied callback. Failures on individual files are collected in
/// the returned summary rather than aborting the whole batch; an upfront
/// overwrite conflict or cancellation aborts the whole call instead.
pub fn copy_files(
    sources: &[PathBuf],
    dest: &Path,
    options: &CopyOptions,
    cancellation: &CancellationToken,
    progress: Option<CopyProgressCallback>,
) -> Result<CopySummary> {
    let planned = resolve_destinations(sources, dest)?;
    preflight(&planned, options, cancellation)?;
    let total_bytes: u64 = planned.iter().map(|p| p.size).sum();
    let reporter = ProgressReporter::new(progress, planned.len() as u64, total_bytes);

    let results: Vec<(PathBuf, Result<u64>)> = shared_pool().install(|| {
        planned
            .par_iter()
            .map(|t| (t.source.clone(), copy_one_file(t, options, &reporter, cancellation)))
            .collect()
    });

    let mut summary = CopySummary::default();
    for (source, result) in results {
        match result {
            Ok(bytes) => {
                summary.files_copied += 1;
                summary.bytes_copied += bytes;
            }
            Err(e) => summary.failed.push((source, e.to_string())),
        }
    }
    Ok(summary)
}

/// Move every source to `dest`. Attempts `fs::rename` first (atomic,
/// same-filesystem); on a cross-device error, falls back to copy-then-
/// delete-source for that file only. An upfront overwrite conflict or
/// cancellation aborts the whole call; later per-file failures collect into
/// the returned summary.
pub fn move_files(
    sources: &[PathBuf],
    dest: &Path,
    options: &CopyOptions,
    cancellation: &CancellationToken,
    progress: Option<CopyProgressCallback>,
) -> Result<CopySummary> {
    let planned = resolve_destinations(sources, dest)?;
    preflight(&planned, options, cancellation)?;
    let total_bytes: u64 = planned.iter().map(|p| p.size).sum();
    let reporter = ProgressReporter::new(progress, planned.len() as u64, total_bytes);

    let results: Vec<(PathBuf, Result<u64>)> = shared_pool().install(|| {
        planned
            .par_iter()
            .map(|t| (t.source.clone(), move_one_file(t, options, &reporter, cancellation)))
            .collect()
    });

    let mut summary = CopySummary::default();
    for (source, result) in results {
        match result {
            Ok(bytes) => {
                summary.files_copied += 1;
                summary.bytes_copied += bytes;
            }
            Err(e) => summary.failed.push((source, e.to_string())),
        }
    }
    Ok(summary)
}

fn move_one_file(
    transfer: &PlannedTransfer,
    options: &CopyOptions,
    reporter: &ProgressReporter,
    cancellation: &CancellationToken,
) -> Result<u64> {
    cancellation.check()?;

    if transfer.dest.exists() && !options.overwrite {
        return Err(Error::copy(format!(
            "destination {:?} exists and overwrite is disabled",
            transfer.dest
        )));
    }

    if let Some(parent) = transfer.dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(&transfer.source, &transfer.dest) {
        Ok(()) => {
            reporter.add_bytes(transfer.size);
            reporter.complete_file(&transfer.source);
            Ok(transfer.size)
        }
        Err(e) if e.raw_os_error() == Some(libc_exdev()) => {
            let bytes = copy_one_file(transfer, options, reporter, cancellation)?;
            fs::remove_file(&transfer.source)?;
            Ok(bytes)
        }
        Err(e) => Err(Error::copy(format!(
            "failed to move {:?} to {:?}: {e}",
            transfer.source, transfer.dest
        ))),
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    libc::EXDEV
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    // No cross-device rename errno on this platform; never matches.
    i32::MIN
}

#[cfg(target_os = "linux")]
fn try_reflink(src: &Path, dst: &Path) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    const FICLONE: libc::c_ulong = 0x40049409;

    let src_file = File::open(src)?;
    let dst_file = File::create(dst)?;
    let ret = unsafe { libc::ioctl(dst_file.as_raw_fd(), FICLONE, src_file.as_raw_fd()) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(target_os = "macos")]
fn try_reflink(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    extern "C" {
        fn clonefile(src: *const libc::c_char, dst: *const libc::c_char, flags: u32) -> i32;
    }

    let src_c = CString::new(src.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid path"))?;
    let dst_c = CString::new(dst.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid path"))?;

    let ret = unsafe { clonefile(src_c.as_ptr(), dst_c.as_ptr(), 0) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn try_reflink(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "reflinks not supported on this platform",
    ))
}
