//! Journal-backed health store
//!
//! Every accepted write is appended to an on-disk journal before it is
//! applied to an in-memory store. On open the journal is replayed.
//!
//! Format per entry:
//! - length: u32 LE (4 bytes)
//! - data: [u8; length] (bincode-encoded StoreWrite)
//! - crc: u32 LE (4 bytes, CRC32 of length + data)
//!
//! A torn or corrupt tail stops replay; the file is cut back to the last good
//! entry so new appends stay readable. Appends keep the same invariant: the
//! file is trimmed to the last intact entry before each write and after a
//! failed one.

use crate::config::SyncMode;
use crate::health::types::{
    ActivitySummary, AggregationMode, AuthorizationStatus, DataType, RawSample, RawStatistics,
    SortOrder, StoreWrite, TimeInterval, WorkoutRecord,
};
use crate::store::{HealthStore, MemoryStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Upper bound on a single encoded entry
const MAX_ENTRY_LEN: usize = 1_000_000;

/// Append-only file of framed writes
struct Journal {
    file: File,
    path: PathBuf,
    /// Byte length covered by intact entries
    valid_len: u64,
    entry_count: u64,
    sync: SyncMode,
}

impl Journal {
    /// Open or create the journal, returning it with every intact entry
    fn open(path: &Path, sync: SyncMode) -> StoreResult<(Self, Vec<StoreWrite>)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, valid_len) = Self::replay(path)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                "Journal {} has {} trailing bytes after entry {}; truncating",
                path.display(),
                file_len - valid_len,
                entries.len()
            );
            file.set_len(valid_len)?;
        }

        let journal = Self {
            file,
            path: path.to_path_buf(),
            valid_len,
            entry_count: entries.len() as u64,
            sync,
        };
        Ok((journal, entries))
    }

    /// Read entries up to the first bad one; returns them with the byte length they span
    fn replay(path: &Path) -> StoreResult<(Vec<StoreWrite>, u64)> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        let mut valid_len = 0u64;

        loop {
            match Self::read_entry(&mut reader) {
                Ok(Some((write, size))) => {
                    entries.push(write);
                    valid_len += size as u64;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Journal replay stopped at entry {}: {}", entries.len(), e);
                    break;
                }
            }
        }

        Ok((entries, valid_len))
    }

    fn read_entry<R: Read>(reader: &mut R) -> StoreResult<Option<(StoreWrite, usize)>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        if len > MAX_ENTRY_LEN {
            return Err(StoreError::Corruption(format!("entry length too large: {}", len)));
        }

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let mut crc_buf = [0u8; 4];
        reader.read_exact(&mut crc_buf)?;
        let stored_crc = u32::from_le_bytes(crc_buf);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len_buf);
        hasher.update(&data);
        let computed_crc = hasher.finalize();

        if stored_crc != computed_crc {
            return Err(StoreError::Corruption(format!(
                "CRC mismatch: stored={}, computed={}",
                stored_crc, computed_crc
            )));
        }

        let write: StoreWrite = bincode::deserialize(&data)?;
        Ok(Some((write, 8 + len)))
    }

    /// Append one entry. A failed append is rolled back, so the file never
    /// keeps a partial entry in front of later ones.
    fn append(&mut self, write: &StoreWrite) -> StoreResult<()> {
        let data = bincode::serialize(write)?;
        if data.len() > MAX_ENTRY_LEN {
            return Err(StoreError::Serialization(format!(
                "entry length too large: {}",
                data.len()
            )));
        }
        let len_bytes = (data.len() as u32).to_le_bytes();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len_bytes);
        hasher.update(&data);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(8 + data.len());
        frame.extend_from_slice(&len_bytes);
        frame.extend_from_slice(&data);
        frame.extend_from_slice(&crc.to_le_bytes());

        if let Err(e) = self.write_frame(&frame) {
            warn!(
                "Journal {} append failed, rolling back to {} bytes: {}",
                self.path.display(),
                self.valid_len,
                e
            );
            if let Err(rollback) = self.file.set_len(self.valid_len) {
                warn!("Journal {} rollback failed: {}", self.path.display(), rollback);
            }
            return Err(e);
        }

        self.valid_len += frame.len() as u64;
        self.entry_count += 1;
        debug!("Journal {} now holds {} entries", self.path.display(), self.entry_count);
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> StoreResult<()> {
        // Bytes past the last intact entry would hide this one from replay
        let file_len = self.file.metadata()?.len();
        if file_len > self.valid_len {
            warn!(
                "Journal {} has {} stray bytes after entry {}; truncating",
                self.path.display(),
                file_len - self.valid_len,
                self.entry_count
            );
            self.file.set_len(self.valid_len)?;
        }

        self.file.write_all(frame)?;
        if self.sync == SyncMode::EveryWrite {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

/// [`HealthStore`] persisted through a journal file
pub struct JournalStore {
    memory: MemoryStore,
    journal: Mutex<Journal>,
}

impl JournalStore {
    /// Open the journal at `path`, replaying it into memory
    pub fn open(path: impl AsRef<Path>, sync: SyncMode) -> StoreResult<Self> {
        let (journal, entries) = Journal::open(path.as_ref(), sync)?;

        let mut memory = MemoryStore::new();
        for write in entries {
            memory.restore(write);
        }

        Ok(Self {
            memory,
            journal: Mutex::new(journal),
        })
    }

    /// Number of entries in the journal
    pub async fn entry_count(&self) -> u64 {
        self.journal.lock().await.entry_count
    }
}

#[async_trait]
impl HealthStore for JournalStore {
    fn backend(&self) -> &str {
        "journal"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn request_authorization(
        &self,
        read: &[&'static DataType],
        write: &[&'static DataType],
    ) -> StoreResult<()> {
        self.memory.request_authorization(read, write).await
    }

    async fn authorization_status(&self, data_type: &DataType) -> AuthorizationStatus {
        self.memory.authorization_status(data_type).await
    }

    async fn query_cumulative_sum(
        &self,
        identifier: &str,
        interval: TimeInterval,
    ) -> StoreResult<Option<f64>> {
        self.memory.query_cumulative_sum(identifier, interval).await
    }

    async fn query_samples(
        &self,
        identifier: &str,
        interval: TimeInterval,
        limit: Option<usize>,
        sort: SortOrder,
    ) -> StoreResult<Vec<RawSample>> {
        self.memory.query_samples(identifier, interval, limit, sort).await
    }

    async fn query_statistics(
        &self,
        identifier: &str,
        interval: TimeInterval,
        mode: AggregationMode,
    ) -> StoreResult<RawStatistics> {
        self.memory.query_statistics(identifier, interval, mode).await
    }

    async fn query_workouts(
        &self,
        interval: TimeInterval,
        activity: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<WorkoutRecord>> {
        self.memory.query_workouts(interval, activity, limit).await
    }

    async fn query_activity_summary(&self, date: NaiveDate) -> StoreResult<Option<ActivitySummary>> {
        self.memory.query_activity_summary(date).await
    }

    async fn save(&self, write: StoreWrite) -> StoreResult<()> {
        // Held across the memory apply so journal order matches apply order
        let mut journal = self.journal.lock().await;
        journal.append(&write)?;
        self.memory.save(write).await
    }
}
