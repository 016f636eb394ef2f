use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use carbonsense_core::{AggregateId, ExpectedVersion};

use super::r#trait::{
    commit_batch, validate_batch, EventStore, EventStoreError, StoredEvent, UncommittedEvent,
};

/// Append-only event log on disk, one JSON `StoredEvent` per line.
///
/// The whole log is read once at open and cached; appends write the batch,
/// then flush and fsync before the cache is updated. A torn final line (no
/// trailing newline) is truncated away at open; any other unreadable line is
/// reported as corruption.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    inner: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    file: File,
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
}

impl FileEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let (streams, valid_len) = parse_log(&contents)?;
        if valid_len < contents.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = contents.len() - valid_len,
                "truncating torn trailing event log record"
            );
            file.set_len(valid_len as u64)?;
        }

        let events: usize = streams.values().map(Vec::len).sum();
        tracing::debug!(path = %path.display(), events, "event log opened");

        Ok(Self {
            path,
            inner: Mutex::new(LogState { file, streams }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse the log; returns the streams and the byte length of the valid prefix.
fn parse_log(
    contents: &str,
) -> Result<(HashMap<AggregateId, Vec<StoredEvent>>, usize), EventStoreError> {
    let mut streams: HashMap<AggregateId, Vec<StoredEvent>> = HashMap::new();
    let mut offset = 0usize;

    for (idx, chunk) in contents.split_inclusive('\n').enumerate() {
        let line = chunk.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            offset += chunk.len();
            continue;
        }

        let event: StoredEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) if !chunk.ends_with('\n') => return Ok((streams, offset)),
            Err(e) => {
                return Err(EventStoreError::Corrupt {
                    line: idx + 1,
                    message: e.to_string(),
                });
            }
        };

        let stream = streams.entry(event.aggregate_id).or_default();
        let expected = stream.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
        if event.sequence_number != expected {
            return Err(EventStoreError::Corrupt {
                line: idx + 1,
                message: format!(
                    "expected sequence_number {expected}, found {}",
                    event.sequence_number
                ),
            });
        }
        stream.push(event);
        offset += chunk.len();
    }

    Ok((streams, offset))
}

/// Writable end of the log.
trait LogFile: Write {
    fn byte_len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn byte_len(&self) -> io::Result<u64> {
        self.metadata().map(|m| m.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write and fsync `bytes`, or leave the log at its previous length.
///
/// A failed write may leave a fragment without a trailing newline; the next
/// append would glue onto it and bury an unreadable record mid-log.
fn append_durably<F: LogFile>(file: &mut F, bytes: &[u8]) -> io::Result<()> {
    let prev_len = file.byte_len()?;
    let written = write_and_sync(file, bytes);
    if let Err(err) = written {
        if let Err(rollback) = file.truncate(prev_len) {
            tracing::error!(
                error = %rollback,
                prev_len,
                "failed to roll back partial event log append"
            );
        }
        return Err(err);
    }
    Ok(())
}

fn write_and_sync<F: LogFile>(file: &mut F, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync()
}

impl EventStore for FileEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some((aggregate_id, aggregate_type)) = validate_batch(&events)? else {
            return Ok(vec![]);
        };

        let mut state = self
            .inner
            .lock()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let existing = state.streams.get(&aggregate_id).map(Vec::as_slice).unwrap_or(&[]);
        let committed = commit_batch(existing, &aggregate_type, events, expected_version)?;

        let mut buf = String::new();
        for e in &committed {
            let line = serde_json::to_string(e)
                .map_err(|err| EventStoreError::InvalidAppend(format!("serialization failed: {err}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        append_durably(&mut state.file, buf.as_bytes())?;

        state
            .streams
            .entry(aggregate_id)
            .or_default()
            .extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;
        Ok(state.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }
}
