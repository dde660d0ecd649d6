//! Named stream registry and STREAM command dispatch
//!
//! A [`Session`] owns every descriptor a program has touched, keyed by the
//! stream's resolved name so `data.txt` and `./data.txt` share one set of
//! cursors. Runtime conditions surface the way a host language sees them:
//! commands answer with the state description, reads hand back whatever
//! data they got and writes report a residual count. Call errors are still
//! returned as errors.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use rxstream_core::{Error, READY_STATUS, Result, StdStream, StreamConfig, StreamState};
use rxstream_parsers::{Query, StreamCommand};

use crate::descriptor::StreamDescriptor;
use crate::path::{NameResolver, SystemResolver};

/// `QUERY DATETIME` layout
const DATETIME_FORMAT: &str = "%m-%d-%y %H:%M:%S";
/// `QUERY TIMESTAMP` layout
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl StreamDescriptor {
    /// Run one decoded STREAM command
    pub fn execute(&mut self, command: &StreamCommand) -> Result<String> {
        match command {
            StreamCommand::Open(params) => {
                self.open_with(params)?;
                Ok(READY_STATUS.to_string())
            }
            StreamCommand::Close => self.close(),
            StreamCommand::Flush => {
                self.flush()?;
                Ok(READY_STATUS.to_string())
            }
            StreamCommand::Seek(params) => Ok(self.position(params)?.to_string()),
            StreamCommand::Query(query) => self.query(query),
        }
    }

    /// Answer a QUERY; unavailable information is the empty string
    pub fn query(&mut self, query: &Query) -> Result<String> {
        match query {
            Query::Exists => Ok(self.exists().unwrap_or_default()),
            Query::Size => Ok(self.query_size().map(|size| size.to_string()).unwrap_or_default()),
            Query::DateTime => Ok(self.modified_time(DATETIME_FORMAT).unwrap_or_default()),
            Query::Timestamp => Ok(self.modified_time(TIMESTAMP_FORMAT).unwrap_or_default()),
            Query::Handle => Ok(self.raw_handle().map(|fd| fd.to_string()).unwrap_or_default()),
            Query::StreamType => Ok(self.stream_type().as_str().to_string()),
            Query::Position(params) => Ok(self.query_position(params)?.to_string()),
        }
    }

    fn query_size(&mut self) -> Option<u64> {
        if self.flags.open {
            return (!self.flags.transient).then(|| self.size().ok()).flatten();
        }
        let meta = std::fs::metadata(self.exists()?).ok()?;
        meta.is_file().then(|| meta.len())
    }

    fn modified_time(&self, format: &str) -> Option<String> {
        if self.flags.transient {
            return None;
        }
        let meta = match self.handle.as_ref().filter(|_| self.flags.open) {
            Some(handle) => handle.metadata().ok().flatten()?,
            None => std::fs::metadata(self.exists()?).ok()?,
        };
        let modified: SystemTime = meta.modified().ok()?;
        Some(DateTime::<Local>::from(modified).format(format).to_string())
    }
}

/// Registry of named streams
pub struct Session {
    streams: HashMap<String, StreamDescriptor>,
    config: StreamConfig,
    resolver: Arc<dyn NameResolver>,
}

impl Session {
    /// Create an empty session using the system resolver
    pub fn new(config: StreamConfig) -> Self {
        Self::with_resolver(config, Arc::new(SystemResolver::new()))
    }

    /// Create an empty session with a custom name resolver
    pub fn with_resolver(config: StreamConfig, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            streams: HashMap::new(),
            config: config.normalized(),
            resolver,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn key(&self, name: &str) -> String {
        if let Some(stream) = StdStream::from_name(name) {
            return stream.name().to_string();
        }
        self.resolver
            .qualify(name)
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string())
    }

    /// Descriptor for `name`, created unopened on first use
    pub fn stream(&mut self, name: &str) -> &mut StreamDescriptor {
        let key = self.key(name);
        let (config, resolver) = (&self.config, &self.resolver);
        self.streams.entry(key).or_insert_with(|| {
            debug!(stream = name, "new descriptor");
            StreamDescriptor::with_resolver(name, config.clone(), Arc::clone(resolver))
        })
    }

    /// Existing descriptor for `name`
    pub fn get(&self, name: &str) -> Option<&StreamDescriptor> {
        self.streams.get(&self.key(name))
    }

    /// Register a file the caller already opened under `name`
    pub fn attach(&mut self, name: &str, file: File) -> &mut StreamDescriptor {
        let key = self.key(name);
        let descriptor = StreamDescriptor::from_file(name, file, self.config.clone());
        match self.streams.entry(key) {
            // Dropping the replaced descriptor closes it
            Entry::Occupied(mut slot) => {
                slot.insert(descriptor);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(descriptor),
        }
    }

    /// Number of descriptors in the session
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Execute a STREAM command such as `"OPEN WRITE APPEND"` or
    /// `"QUERY SEEK READ LINE"`
    ///
    /// Runtime conditions answer with the stream's state description.
    pub fn command(&mut self, name: &str, command: &str) -> Result<String> {
        let command = StreamCommand::parse(command)?;
        let stream = self.stream(name);
        match stream.execute(&command) {
            Err(err) if err.is_runtime() => {
                debug!(stream = name, error = %err, "command raised a condition");
                Ok(stream.description())
            }
            other => other,
        }
    }

    /// STREAM 'S': `READY`, `NOTREADY`, `ERROR` or `UNKNOWN`
    pub fn state(&self, name: &str) -> String {
        self.get(name)
            .map_or(StreamState::Unknown, StreamDescriptor::state)
            .as_str()
            .to_string()
    }

    /// STREAM 'D': state plus detail, e.g. `NOTREADY:EOF`
    pub fn description(&self, name: &str) -> String {
        self.get(name)
            .map_or_else(|| StreamState::Unknown.describe(0), StreamDescriptor::description)
    }

    /// Characters read; on a condition, whatever was read before it
    pub fn charin(&mut self, name: &str, position: Option<u64>, length: Option<i64>) -> Result<Vec<u8>> {
        recover(self.stream(name).charin(position, length), Error::into_partial)
    }

    /// Residual count: 0 when everything was written
    pub fn charout(&mut self, name: &str, data: Option<&[u8]>, position: Option<u64>) -> Result<usize> {
        let residual = data.map_or(0, <[u8]>::len);
        recover(self.stream(name).charout(data, position), |_| residual)
    }

    /// Line read; empty on a condition
    pub fn linein(&mut self, name: &str, position: Option<u64>, count: Option<u64>) -> Result<Vec<u8>> {
        recover(self.stream(name).linein(position, count), Error::into_partial)
    }

    /// Residual count: 0 when the line was written, 1 otherwise
    pub fn lineout(&mut self, name: &str, data: Option<&[u8]>, position: Option<u64>) -> Result<usize> {
        let residual = usize::from(data.is_some());
        recover(self.stream(name).lineout(data, position), |_| residual)
    }

    pub fn lines(&mut self, name: &str, quick: bool) -> Result<u64> {
        recover(self.stream(name).lines(quick), |_| 0)
    }

    pub fn chars(&mut self, name: &str) -> Result<u64> {
        recover(self.stream(name).chars(), |_| 0)
    }

    /// Close every open stream
    pub fn close_all(&mut self) {
        for (key, stream) in self.streams.iter_mut().filter(|(_, stream)| stream.is_open()) {
            if let Err(err) = stream.close() {
                warn!(stream = %key, error = %err, "close failed");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Turn a runtime condition into the fallback value the host sees
fn recover<T>(result: Result<T>, fallback: impl FnOnce(Error) -> T) -> Result<T> {
    match result {
        Err(err) if err.is_runtime() => Ok(fallback(err)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session_in(dir: &tempfile::TempDir) -> Session {
        let resolver = SystemResolver::new().with_cwd(dir.path());
        Session::with_resolver(StreamConfig::default(), Arc::new(resolver))
    }

    #[test]
    fn test_names_share_one_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.lineout("notes.txt", Some(b"hello"), None).unwrap();
        assert_eq!(session.linein("./notes.txt", Some(1), None).unwrap(), b"hello");
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_unknown_stream_state() {
        let session = Session::new(StreamConfig::default());
        assert_eq!(session.state("nothing"), "UNKNOWN");
        assert_eq!(session.description("nothing"), "UNKNOWN:");
    }

    #[test]
    fn test_open_close_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);

        assert_eq!(session.command("c.txt", "OPEN WRITE").unwrap(), "READY:");
        assert_eq!(session.state("c.txt"), "READY");
        assert_eq!(session.command("c.txt", "CLOSE").unwrap(), "READY:");
        assert_eq!(session.command("c.txt", "CLOSE").unwrap(), "");
    }

    #[test]
    fn test_failed_open_answers_description() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        let answer = session.command("missing.txt", "OPEN READ").unwrap();
        assert!(answer.starts_with(&format!("NOTREADY:{} ", libc::ENOENT)));
        assert_eq!(session.description("missing.txt"), answer);
    }

    #[test]
    fn test_call_errors_propagate() {
        let mut session = Session::new(StreamConfig::default());
        assert!(matches!(session.command("x", "OPEN READ WRITE"), Err(Error::AmbiguousOption { .. })));
        assert!(session.command("x", "FROB").is_err());
    }

    #[test]
    fn test_queries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.txt"), b"one\ntwo\n").unwrap();
        let mut session = session_in(&dir);

        let path = PathBuf::from(session.command("q.txt", "QUERY EXISTS").unwrap());
        assert!(path.ends_with("q.txt"));
        assert_eq!(session.command("q.txt", "QUERY SIZE").unwrap(), "8");
        assert_eq!(session.command("q.txt", "QUERY STREAMTYPE").unwrap(), "UNKNOWN");
        assert_eq!(session.command("q.txt", "QUERY HANDLE").unwrap(), "");

        let timestamp = session.command("q.txt", "QUERY TIMESTAMP").unwrap();
        assert_eq!(timestamp.len(), "YYYY-MM-DD HH:MM:SS".len());
        let datetime = session.command("q.txt", "QUERY DATETIME").unwrap();
        assert_eq!(datetime.len(), "MM-DD-YY HH:MM:SS".len());

        session.command("q.txt", "OPEN READ").unwrap();
        assert_eq!(session.command("q.txt", "QUERY STREAMTYPE").unwrap(), "PERSISTENT");
        assert!(!session.command("q.txt", "QUERY HANDLE").unwrap().is_empty());
        assert_eq!(session.command("missing", "QUERY EXISTS").unwrap(), "");
    }

    #[test]
    fn test_seek_and_query_position() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s.txt"), b"a\nbb\nccc\n").unwrap();
        let mut session = session_in(&dir);

        assert_eq!(session.command("s.txt", "SEEK =3 READ LINE").unwrap(), "3");
        assert_eq!(session.command("s.txt", "QUERY POSITION READ CHAR").unwrap(), "6");
        assert_eq!(session.command("s.txt", "QUERY SEEK READ SYS").unwrap(), "5");
        assert_eq!(session.linein("s.txt", None, None).unwrap(), b"ccc");
    }

    #[test]
    fn test_conditions_recover_partial_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p.txt"), b"xy").unwrap();
        let mut session = session_in(&dir);

        assert_eq!(session.charin("p.txt", None, Some(10)).unwrap(), b"xy");
        assert_eq!(session.description("p.txt"), "NOTREADY:EOF");
        assert_eq!(session.linein("p.txt", None, None).unwrap(), b"");
        assert_eq!(session.lines("p.txt", false).unwrap(), 0);
    }

    #[test]
    fn test_attach_supplied_file() {
        let mut session = Session::new(StreamConfig::default());
        let file = tempfile::tempfile().unwrap();
        session.attach("scratch", file);
        assert_eq!(session.charout("scratch", Some(b"abc"), None).unwrap(), 0);
        assert_eq!(session.chars("scratch").unwrap(), 3);
        assert_eq!(session.charin("scratch", Some(1), Some(3)).unwrap(), b"abc");
    }
}
