use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{StoreMetadata, SCHEMA_VERSION};
use crate::{Error, Result};

const CURRENT: &str = "CURRENT";
const CURRENT_TMP_PREFIX: &str = "CURRENT.tmp-";
const LOCK: &str = "LOCK";
const META: &str = "meta.json";
const ANSWERS: &str = "answers.json";
const VECTORS: &str = "vectors.f32";
const GENERATION_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";

/// Times a read follows `CURRENT` after the generation it resolved vanished
const READ_ATTEMPTS: usize = 3;

/// Write a complete generation and point `CURRENT` at it.
///
/// The generation `CURRENT` named before the swap is kept until the next
/// write, so readers that resolved it just before the swap can finish.
pub(super) fn write_generation(
    base: &Path,
    meta: &StoreMetadata,
    vectors: &[f32],
    answers: &[String],
) -> Result<PathBuf> {
    publish(base, meta, vectors, answers, &sync_dir)
}

fn publish(
    base: &Path,
    meta: &StoreMetadata,
    vectors: &[f32],
    answers: &[String],
    sync_base: &dyn Fn(&Path) -> Result<()>,
) -> Result<PathBuf> {
    fs::create_dir_all(base)?;
    let _lock = WriterLock::acquire(base)?;
    let previous = pointer_name(base).ok();

    let id = format!(
        "{}-{}",
        meta.created_at.format("%Y%m%dT%H%M%S%.3fZ"),
        Uuid::new_v4().simple()
    );
    let name = format!("{GENERATION_PREFIX}{id}");
    let staging = base.join(format!("{STAGING_PREFIX}{id}"));
    let generation = base.join(&name);

    fs::create_dir(&staging)?;
    if let Err(e) = write_artifacts(&staging, meta, vectors, answers) {
        remove_best_effort(&staging);
        return Err(e);
    }
    if let Err(e) = fs::rename(&staging, &generation) {
        remove_best_effort(&staging);
        return Err(e.into());
    }
    sync_base(base)?;

    // the generation is complete on disk; only now does it become visible
    if let Err(e) = swap_pointer(base, &id, &name) {
        remove_best_effort(&generation);
        return Err(e);
    }
    // `CURRENT` names the new generation from here on, so it is never removed
    sync_base(base)?;

    prune(base, &name, previous.as_deref());
    Ok(generation)
}

/// Read and validate the generation `CURRENT` points at.
pub(super) fn read_generation(base: &Path) -> Result<(StoreMetadata, Vec<f32>, Vec<String>)> {
    read_current(base, read_artifacts)
}

pub(super) fn read_metadata(base: &Path) -> Result<StoreMetadata> {
    read_current(base, parse_metadata)
}

/// Run `read` on the current generation.
///
/// A writer may swap `CURRENT` and prune the generation a reader resolved
/// while the read is in flight. That shows up as missing artifacts, and
/// the read is retried against the new generation.
fn read_current<T>(base: &Path, read: impl Fn(&Path) -> Result<T>) -> Result<T> {
    let mut dir = current_generation(base)?;
    for _ in 1..READ_ATTEMPTS {
        match read(&dir) {
            Err(Error::StoreCorrupt(msg)) => {
                let now = current_generation(base)?;
                if now == dir {
                    return Err(Error::StoreCorrupt(msg));
                }
                debug!(from = %dir.display(), to = %now.display(), "generation replaced during read");
                dir = now;
            }
            result => return result,
        }
    }
    read(&dir)
}

fn current_generation(base: &Path) -> Result<PathBuf> {
    Ok(base.join(pointer_name(base)?))
}

fn pointer_name(base: &Path) -> Result<String> {
    // a missing pointer means nothing was ever persisted here
    let raw = fs::read_to_string(base.join(CURRENT))?;
    let name = raw.trim();
    if !name.starts_with(GENERATION_PREFIX) || name.contains(['/', '\\']) || name.contains("..") {
        return Err(Error::corrupt(format!("invalid {CURRENT} pointer {name:?}")));
    }
    Ok(name.to_string())
}

fn read_artifacts(dir: &Path) -> Result<(StoreMetadata, Vec<f32>, Vec<String>)> {
    let meta = parse_metadata(dir)?;

    let answers: Vec<String> = serde_json::from_slice(&read_artifact(dir, ANSWERS)?)
        .map_err(|e| Error::corrupt(format!("{ANSWERS}: {e}")))?;
    if answers.len() != meta.count {
        return Err(Error::corrupt(format!(
            "metadata count is {} but answer pool has {} entries",
            meta.count,
            answers.len()
        )));
    }

    let bytes = read_artifact(dir, VECTORS)?;
    let expected = meta
        .count
        .checked_mul(meta.dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::corrupt("count * dimension overflows"))?;
    if bytes.len() != expected {
        return Err(Error::corrupt(format!(
            "{VECTORS} holds {} bytes, expected {expected} for {} vectors of dimension {}",
            bytes.len(),
            meta.count,
            meta.dimension
        )));
    }

    let vectors: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if let Some(pos) = vectors.iter().position(|x| !x.is_finite()) {
        return Err(Error::corrupt(format!(
            "non-finite component in vector {}",
            pos / meta.dimension
        )));
    }

    Ok((meta, vectors, answers))
}

fn parse_metadata(dir: &Path) -> Result<StoreMetadata> {
    let meta: StoreMetadata = serde_json::from_slice(&read_artifact(dir, META)?)
        .map_err(|e| Error::corrupt(format!("{META}: {e}")))?;

    if meta.schema_version != SCHEMA_VERSION {
        return Err(Error::corrupt(format!(
            "unsupported schema version {} (expected {SCHEMA_VERSION})",
            meta.schema_version
        )));
    }
    if meta.dimension == 0 {
        return Err(Error::corrupt("dimension is 0"));
    }
    Ok(meta)
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::corrupt(format!("missing {name} in {}", dir.display())),
        _ => e.into(),
    })
}

fn write_artifacts(dir: &Path, meta: &StoreMetadata, vectors: &[f32], answers: &[String]) -> Result<()> {
    let mut bytes = Vec::with_capacity(vectors.len() * 4);
    for x in vectors {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    write_synced(&dir.join(VECTORS), &bytes)?;
    write_synced(&dir.join(ANSWERS), &serde_json::to_vec(answers)?)?;
    // metadata last: a generation without it is never valid
    write_synced(&dir.join(META), &serde_json::to_vec_pretty(meta)?)?;
    sync_dir(dir)
}

/// Atomically replace `CURRENT` with `name`. On error `CURRENT` is unchanged.
fn swap_pointer(base: &Path, id: &str, name: &str) -> Result<()> {
    let tmp = base.join(format!("{CURRENT_TMP_PREFIX}{id}"));
    let swapped = write_synced(&tmp, format!("{name}\n").as_bytes())
        .and_then(|()| fs::rename(&tmp, base.join(CURRENT)).map_err(Error::from));
    if swapped.is_err() {
        remove_best_effort(&tmp);
    }
    swapped
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Remove generations other than `keep` and `previous`, plus staging
/// directories and pointer temp files left by crashed writers.
///
/// Only called with the writer lock held, so nothing removed here belongs
/// to a live writer.
fn prune(base: &Path, keep: &str, previous: Option<&str>) {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %base.display(), error = %e, "could not list store directory for pruning");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let stale = (name.starts_with(GENERATION_PREFIX) && name != keep && Some(name) != previous)
            || name.starts_with(STAGING_PREFIX)
            || name.starts_with(CURRENT_TMP_PREFIX);
        if stale {
            debug!(entry = name, "pruning stale store entry");
            remove_best_effort(&entry.path());
        }
    }
}

fn remove_best_effort(path: &Path) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = removed {
        warn!(path = %path.display(), error = %e, "failed to remove store entry");
    }
}

/// Exclusive writer lock on a store directory, released on drop.
///
/// Held across processes through a `LOCK` file created with `create_new`.
/// A lock left behind by a killed writer has to be removed by hand.
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(base: &Path) -> Result<Self> {
        let path = base.join(LOCK);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let lock = Self { path };
                // owner pid, for whoever has to clear a stale lock
                writeln!(file, "{}", std::process::id())?;
                Ok(lock)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "store directory is locked by another writer");
                Err(Error::RebuildInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}
