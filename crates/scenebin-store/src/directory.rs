//! Filesystem cache bin
//!
//! Layout under `<root>/<bin id>/`:
//!
//! ```text
//! <stem>.bin         encoded record
//! <stem>.meta.json   sidecar { key, kind, written_at_ms, metadata }
//! ```
//!
//! The stem is the key itself when it only contains `[A-Za-z0-9_.-]`,
//! otherwise `~` followed by the hex encoding of the key. Both files are
//! replaced atomically through a temporary file in the same directory.

use crate::bin::{validate_key, CacheBin, CacheObject, RecordStatus};
use crate::codec;
use crate::error::BinError;
use crate::key::ResourceKind;
use crate::options::{Metadata, ReadOptions, WriteOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const RECORD_SUFFIX: &str = ".bin";
const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    kind: ResourceKind,
    written_at_ms: u64,
    #[serde(default)]
    metadata: Metadata,
}

/// Cache bin storing one file per record
#[derive(Debug)]
pub struct DirectoryCacheBin {
    id: String,
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl DirectoryCacheBin {
    /// Open (creating if needed) the bin `id` under `root`
    ///
    /// # Errors
    /// Returns error if the bin directory cannot be created
    pub fn open(root: impl AsRef<Path>, id: impl Into<String>) -> io::Result<Self> {
        let id = id.into();
        let dir = root.as_ref().join(file_stem(&id));
        fs::create_dir_all(&dir)?;
        debug!(bin = %id, dir = %dir.display(), "directory bin opened");
        Ok(Self {
            id,
            dir,
            max_age: None,
        })
    }

    /// Expire records older than `max_age`
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Directory holding the records
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{RECORD_SUFFIX}", file_stem(key)))
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{SIDECAR_SUFFIX}", file_stem(key)))
    }

    fn persist(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_data()?;
        file.persist(path).map_err(|err| err.error)?;
        Ok(())
    }

    fn read_sidecar(&self, key: &str) -> Result<Option<Sidecar>, BinError> {
        let bytes = match fs::read(self.sidecar_path(key)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(BinError::io(key, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| BinError::codec(key, err.into()))
    }

    fn write_sidecar(&self, sidecar: &Sidecar) -> Result<(), BinError> {
        let bytes = serde_json::to_vec_pretty(sidecar).map_err(|err| BinError::codec(&sidecar.key, err.into()))?;
        self.persist(&self.sidecar_path(&sidecar.key), &bytes)
            .map_err(|err| BinError::io(&sidecar.key, err))
    }

    fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }
}

impl CacheBin for DirectoryCacheBin {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(
        &self,
        key: &str,
        object: &CacheObject,
        metadata: &Metadata,
        options: &WriteOptions,
    ) -> Result<(), BinError> {
        validate_key(key)?;
        let bytes = codec::encode(object, options).map_err(|err| BinError::codec(key, err))?;
        self.persist(&self.record_path(key), &bytes)
            .map_err(|err| BinError::io(key, err))?;
        self.write_sidecar(&Sidecar {
            key: key.to_string(),
            kind: object.kind(),
            written_at_ms: now_ms(),
            metadata: metadata.clone(),
        })?;
        debug!(bin = %self.id, %key, size = bytes.len(), "record persisted");
        Ok(())
    }

    fn read_object(&self, key: &str, options: &ReadOptions) -> Result<Option<CacheObject>, BinError> {
        let bytes = match fs::read(self.record_path(key)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(BinError::io(key, err)),
        };
        codec::decode(&bytes, options)
            .map(Some)
            .map_err(|err| BinError::codec(key, err))
    }

    fn read_metadata(&self, key: &str) -> Result<Option<Metadata>, BinError> {
        Ok(self.read_sidecar(key)?.map(|sidecar| sidecar.metadata))
    }

    fn record_status(&self, key: &str) -> RecordStatus {
        if !self.record_path(key).is_file() {
            return RecordStatus::Missing;
        }
        let sidecar = match self.read_sidecar(key) {
            Ok(Some(sidecar)) => sidecar,
            Ok(None) => return RecordStatus::Expired,
            Err(err) => {
                warn!(bin = %self.id, %key, error = %err, "unreadable sidecar, treating record as expired");
                return RecordStatus::Expired;
            }
        };
        match self.max_age {
            Some(max_age) if now_ms().saturating_sub(sidecar.written_at_ms) > duration_ms(max_age) => {
                RecordStatus::Expired
            }
            _ => RecordStatus::Valid,
        }
    }

    fn remove(&self, key: &str) -> Result<bool, BinError> {
        let existed = remove_if_present(&self.record_path(key)).map_err(|err| BinError::io(key, err))?;
        remove_if_present(&self.sidecar_path(key)).map_err(|err| BinError::io(key, err))?;
        Ok(existed)
    }

    fn touch(&self, key: &str) -> Result<bool, BinError> {
        if !self.record_path(key).is_file() {
            return Ok(false);
        }
        let Some(mut sidecar) = self.read_sidecar(key)? else {
            return Ok(false);
        };
        sidecar.written_at_ms = now_ms();
        self.write_sidecar(&sidecar)?;
        Ok(true)
    }

    fn clear(&self) -> Result<(), BinError> {
        let paths = self.entries().map_err(|err| BinError::io(&self.id, err))?;
        for path in paths {
            remove_if_present(&path).map_err(|err| BinError::io(&self.id, err))?;
        }
        Ok(())
    }

    fn storage_size(&self) -> u64 {
        let Ok(paths) = self.entries() else {
            return 0;
        };
        paths
            .iter()
            .filter(|path| path.to_string_lossy().ends_with(RECORD_SUFFIX))
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// File stem for `key`
fn file_stem(key: &str) -> String {
    let plain = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
    if plain && !key.starts_with('.') {
        key.to_string()
    } else {
        format!("~{}", hex::encode(key))
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, duration_ms)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
