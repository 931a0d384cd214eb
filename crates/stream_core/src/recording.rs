use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

/// Recording session that contains the original request and all chunks
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordingSession {
    /// The request that was sent
    pub request: serde_json::Value,
    /// Timestamp of when the recording was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Raw chunks as received from the transport
    pub chunks: Vec<RecordedChunk>,
}

/// Single recorded transport chunk with timing info
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    /// Raw chunk bytes; stored base64 encoded since chunks may split UTF-8 sequences
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Milliseconds since recording start
    pub timestamp_ms: u64,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Recorder for raw stream responses
#[derive(Clone)]
pub struct APIRecorder {
    file_path: PathBuf,
    current_session: Arc<Mutex<Option<RecordingSession>>>,
    start_time: Arc<Mutex<Option<Instant>>>,
}

impl APIRecorder {
    /// Create a new recorder that writes to the specified file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            current_session: Arc::new(Mutex::new(None)),
            start_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Start a new recording session
    pub fn start_recording(&self, request: serde_json::Value) {
        *lock(&self.current_session) = Some(RecordingSession {
            request,
            timestamp: chrono::Utc::now(),
            chunks: Vec::new(),
        });
        *lock(&self.start_time) = Some(Instant::now());
    }

    /// Record an incoming chunk
    pub fn record_chunk(&self, data: &[u8]) {
        let mut session_guard = lock(&self.current_session);
        let start_guard = lock(&self.start_time);

        if let (Some(session), Some(start_time)) = (session_guard.as_mut(), *start_guard) {
            let timestamp_ms = start_time.elapsed().as_millis() as u64;
            session.chunks.push(RecordedChunk {
                data: data.to_vec(),
                timestamp_ms,
            });
        }
    }

    /// End the current recording session and append it to the file
    pub fn end_recording(&self) -> Result<()> {
        let session = lock(&self.current_session).take();
        *lock(&self.start_time) = None;

        let Some(session) = session else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&session)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.file_path)
            .with_context(|| format!("Failed to open recording file {}", self.file_path.display()))?;

        let file_size = file.metadata()?.len();
        if file_size == 0 {
            // Start a JSON array
            writeln!(file, "[")?;
        } else {
            // Skip "\n]\n" backwards from the end and continue the array
            file.set_len(file_size.saturating_sub(3))?;
            file.seek(std::io::SeekFrom::End(0))?;
            writeln!(file, ",")?;
        }
        writeln!(file, "{json}")?;
        writeln!(file, "]")?;

        debug!(
            "Recorded session with {} chunks to {}",
            session.chunks.len(),
            self.file_path.display()
        );
        Ok(())
    }
}

/// Recorded sessions handed out in order
#[derive(Clone)]
pub struct PlaybackState {
    sessions: Arc<Vec<RecordingSession>>,
    index: Arc<Mutex<usize>>,
}

impl PlaybackState {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path).context("Failed to open recording file")?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .context("Failed to read recording file")?;
        let sessions: Vec<RecordingSession> =
            serde_json::from_str(&contents).context("Failed to parse recording file")?;
        Ok(Self {
            sessions: Arc::new(sessions),
            index: Arc::new(Mutex::new(0)),
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Take the next session, or None if exhausted
    pub fn next_session(&self) -> Option<RecordingSession> {
        let mut idx = lock(&self.index);
        let session = self.sessions.get(*idx)?.clone();
        *idx += 1;
        Some(session)
    }
}
