//! Encrypted File Backend
//!
//! One encrypted record file per key, sharded into a two-level directory
//! tree below `<root>/<namespace>/`. Writes go through a temp file and an
//! atomic rename so readers see either the old record or the new one.

mod cipher;
mod path;
mod record;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration as StdDuration, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cache::bounded::BoundedMap;
use crate::cache::entry::{expiration_from_timestamp, expiration_to_timestamp, is_past};
use crate::cache::key::Namespace;
use crate::cache::pool::{Backend, CachePool};
use crate::cache::promotion::{Promotion, PromotionQueue};
use crate::cache::{CacheItem, MIRROR_CAPACITY};
use crate::error::{CacheError, Result};

pub use cipher::{CipherKind, RecordCipher};
pub use path::ShardPath;
pub use record::{content_hash, Payload, Record};

/// Reserved directory for in-flight writes, never a valid shard name.
pub const TEMP_DIR: &str = ".tmp";

/// Temp files older than this are leftovers from failed writes.
pub const STALE_TEMP_AGE: StdDuration = StdDuration::from_secs(60 * 60);

// == Options ==
/// Construction options for [`FileBackend`].
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    /// Encryption secret; defaults to the root directory path.
    pub secret: Option<String>,
    pub cipher: CipherKind,
}

// == File Backend ==
#[derive(Debug)]
pub struct FileBackend {
    namespace: Namespace,
    /// `<root>/<namespace>`
    dir: PathBuf,
    cipher: RecordCipher,
    /// Recently touched items
    mirror: BoundedMap<CacheItem>,
    /// Keys whose record was seen on disk. Absence is never cached, so a
    /// record written by another instance shows up on the next lookup.
    known: BoundedMap<()>,
    promotions: PromotionQueue,
}

impl FileBackend {
    // == Constructors ==
    /// Creates a backend with the default cipher and secret.
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        Self::with_options(root, namespace, FileOptions::default())
    }

    /// Creates a backend. No directory is created until the first write.
    pub fn with_options(
        root: impl AsRef<Path>,
        namespace: &str,
        options: FileOptions,
    ) -> Result<Self> {
        let root = root.as_ref();
        let namespace = Namespace::new(namespace)?;
        let secret = options
            .secret
            .unwrap_or_else(|| root.to_string_lossy().into_owned());

        Ok(Self {
            dir: root.join(namespace.as_str()),
            namespace,
            cipher: RecordCipher::new(options.cipher, secret.as_bytes()),
            mirror: BoundedMap::new(MIRROR_CAPACITY),
            known: BoundedMap::new(MIRROR_CAPACITY),
            promotions: PromotionQueue::new(),
        })
    }

    /// Namespace directory holding the shard tree.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record file path for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        ShardPath::for_key(key).file(&self.dir)
    }

    /// Number of hit promotions not yet written back.
    pub fn pending_promotions(&self) -> usize {
        self.promotions.len()
    }

    // == Existence ==
    fn exists(&mut self, key: &str) -> bool {
        if self.known.contains(key) {
            return true;
        }
        let exists = self.record_path(key).is_file();
        if exists {
            self.known.insert(key, ());
        }
        exists
    }

    // == Read ==
    fn read_record(&self, key: &str) -> Result<CacheItem> {
        let file = File::open(self.record_path(key))?;
        let mut reader = BufReader::new(file);

        let timestamp = record::read_expiration(&mut reader)?;
        let expiration = expiration_from_timestamp(timestamp);
        if is_past(expiration) {
            return Err(CacheError::NotFound(format!("{} expired", key)));
        }

        let record = Record::read_rest(&mut reader, timestamp, self.cipher.iv_length())?;
        let plaintext = self.cipher.decrypt(&record.iv, &record.ciphertext)?;
        let payload = Payload::decode(&plaintext)?;
        if payload.key != key {
            return Err(CacheError::Integrity(format!(
                "record holds key '{}'",
                payload.key
            )));
        }

        Ok(CacheItem::restore(
            key,
            payload.value,
            payload.is_hit,
            expiration,
        ))
    }

    /// Reads `key`, deleting the record on any failure.
    fn load(&mut self, key: &str) -> Option<CacheItem> {
        match self.read_record(key) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!(namespace = %self.namespace, key, error = %e, "Discarding unreadable record");
                self.remove_record(key);
                None
            }
        }
    }

    // == Write ==
    /// Encrypts `item` into a record. Nothing touches the disk here.
    fn seal_record(&self, item: &CacheItem) -> Result<Record> {
        let plaintext = Payload {
            value: item.get().clone(),
            is_hit: item.is_hit(),
            key: item.key().to_string(),
        }
        .encode()?;

        let iv = self.cipher.generate_iv();
        let ciphertext = self.cipher.encrypt(&iv, &plaintext)?;
        Ok(Record::seal(
            expiration_to_timestamp(item.expiration()),
            iv,
            ciphertext,
        ))
    }

    fn write_record(&self, item: &CacheItem) -> Result<()> {
        let record = self.seal_record(item)?;
        let target = self.record_path(item.key());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_dir = self.dir.join(TEMP_DIR);
        fs::create_dir_all(&temp_dir)?;

        let (temp_path, file) = create_temp_file(&temp_dir)?;
        let written = fill_temp_file(file, &record, item)
            .and_then(|()| fs::rename(&temp_path, &target).map_err(CacheError::from));

        if written.is_err() {
            if let Err(e) = fs::remove_file(&temp_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "Could not remove temp file");
                }
            }
        }
        written
    }

    // == Remove ==
    /// Forgets `key` everywhere and deletes its record, best effort.
    fn remove_record(&mut self, key: &str) -> bool {
        self.mirror.remove(key);
        self.promotions.cancel(key);
        self.known.remove(key);

        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not delete record");
                false
            }
        }
    }

    // == Promotions ==
    /// Writes back every pending hit promotion. Failures are only logged.
    pub fn flush_promotions(&mut self) {
        for promotion in self.promotions.drain(Utc::now()) {
            match promotion {
                Promotion::Expired(key) => {
                    self.remove_record(&key);
                }
                Promotion::Promote(key) => {
                    let item = match self.mirror.get(&key) {
                        Some(item) => item.clone(),
                        None => match self.read_record(&key) {
                            Ok(item) => item,
                            Err(_) => continue,
                        },
                    };
                    if item.is_hit() {
                        continue;
                    }

                    let promoted = item.into_hit();
                    match self.write_record(&promoted) {
                        Ok(()) => {
                            if let Some(slot) = self.mirror.get_mut(&key) {
                                *slot = promoted;
                            }
                        }
                        Err(e) => {
                            warn!(namespace = %self.namespace, key = %key, error = %e, "Hit promotion failed");
                        }
                    }
                }
            }
        }
    }

    fn remember(&mut self, item: CacheItem) {
        let key = item.key().to_string();
        if let Some((evicted, _)) = self.mirror.insert(&key, item) {
            debug!(namespace = %self.namespace, key = %evicted, "Evicted mirror entry");
        }
    }

    // == Walk ==
    /// Record files below the shard directories.
    fn record_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .strip_prefix(&self.dir)
                    .ok()
                    .and_then(|rel| rel.parent())
                    .map(|shard| {
                        shard
                            .components()
                            .all(|c| path::is_shard_dir_name(&c.as_os_str().to_string_lossy()))
                    })
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect()
    }
}

impl Backend for FileBackend {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn fetch(&mut self, key: &str) -> Option<CacheItem> {
        if let Some(item) = self.mirror.get(key) {
            if item.is_expired() {
                self.remove_record(key);
                return None;
            }
            if item.is_hit() {
                let item = item.clone();
                self.promotions.cancel(key);
                return Some(item);
            }

            self.flush_promotions();
            let item = self.mirror.get(key)?.clone();
            if !item.is_hit() {
                self.promotions.schedule(key, item.expiration());
            }
            return Some(item.into_hit());
        }

        if !self.exists(key) {
            return None;
        }
        self.flush_promotions();

        let item = self.load(key)?;
        if !item.is_hit() {
            self.promotions.schedule(key, item.expiration());
        }
        self.remember(item.clone());
        Some(item)
    }

    fn clear(&mut self, keys: &[String]) -> bool {
        if !keys.is_empty() {
            return keys
                .iter()
                .fold(true, |ok, key| self.remove_record(key) && ok);
        }

        self.mirror.clear();
        self.promotions.clear();
        self.known.clear();

        let mut ok = true;
        for path in self.record_files() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Could not delete record");
                    ok = false;
                }
            }
        }
        ok
    }

    /// Encryption failures are raised; every other failure reads as `false`.
    fn persist(&mut self, item: &CacheItem) -> Result<bool> {
        self.flush_promotions();

        if item.is_expired() {
            return Ok(self.remove_record(item.key()));
        }

        match self.write_record(item) {
            Ok(()) => {
                self.promotions.cancel(item.key());
                self.known.insert(item.key(), ());
                self.remember(item.clone());
                Ok(true)
            }
            Err(e @ CacheError::Cipher(_)) => Err(e),
            Err(e) => {
                warn!(namespace = %self.namespace, key = item.key(), error = %e, "Could not persist record");
                Ok(false)
            }
        }
    }

    /// Deletes expired records and stale temp files.
    fn prune(&mut self) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        for path in self.record_files() {
            // A future mtime means a future expiration; skip without parsing.
            let modified = fs::metadata(&path).and_then(|m| m.modified());
            if matches!(modified, Ok(at) if at > now) {
                continue;
            }

            let expired = File::open(&path)
                .map(BufReader::new)
                .map_err(CacheError::from)
                .and_then(|mut reader| record::read_expiration(&mut reader))
                .map(|secs| is_past(expiration_from_timestamp(secs)))
                .unwrap_or(false);

            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        removed += prune_stale_temp_files(&self.dir.join(TEMP_DIR), now);
        if removed > 0 {
            self.known.clear();
        }
        removed
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        self.flush_promotions();
    }
}

impl CachePool<FileBackend> {
    /// Pool over an encrypted file store rooted at `root`.
    pub fn file(root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        Ok(Self::new(FileBackend::new(root, namespace)?))
    }
}

// == Helpers ==
fn fill_temp_file(mut file: File, record: &Record, item: &CacheItem) -> Result<()> {
    file.write_all(&record.to_bytes())?;
    file.flush()?;
    if let Some(at) = item.expiration() {
        file.set_modified(SystemTime::from(at))?;
    }
    Ok(())
}

/// Creates a uniquely named temp file, retrying once on a name collision.
fn create_temp_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    let mut attempts = 0;
    loop {
        let path = dir.join(format!(
            "{}.{:016x}.tmp",
            std::process::id(),
            rand::random::<u64>()
        ));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts == 0 => attempts += 1,
            Err(e) => return Err(e),
        }
    }
}

fn prune_stale_temp_files(temp_dir: &Path, now: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(temp_dir) else {
        return 0;
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|at| now.duration_since(at).ok())
                .is_some_and(|age| age > STALE_TEMP_AGE)
        })
        .filter(|e| fs::remove_file(e.path()).is_ok())
        .count()
}
