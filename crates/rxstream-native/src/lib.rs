//! rxstream native stream layer
//!
//! Character and line streams over OS file handles:
//! - Persistent files with independent read and write cursors
//! - Transient devices (terminals, pipes) read and written sequentially
//! - Standard streams addressed as `STDIN`, `STDOUT`, `STDERR`
//!
//! # Example
//! ```no_run
//! use rxstream_core::StreamConfig;
//! use rxstream_native::Session;
//!
//! let mut session = Session::new(StreamConfig::default());
//! session.command("notes.txt", "OPEN BOTH APPEND").unwrap();
//! session.lineout("notes.txt", Some(b"another line"), None).unwrap();
//!
//! session.command("notes.txt", "SEEK =1 READ LINE").unwrap();
//! while session.lines("notes.txt", true).unwrap() > 0 {
//!     let line = session.linein("notes.txt", None, None).unwrap();
//!     println!("{}", String::from_utf8_lossy(&line));
//! }
//! ```

pub mod cache;
pub mod descriptor;
pub mod handle;
pub mod open;
pub mod ops;
pub mod path;
pub mod position;
pub mod scan;
pub mod session;
pub mod stream;

pub use cache::PseudoCache;
pub use descriptor::{LineTracker, StreamDescriptor, StreamFlags, StreamInfo};
pub use handle::{DeviceKind, LineRead, StreamHandle};
pub use path::{normalize_path, NameResolver, SystemResolver};
pub use scan::{count_lines, LineCounter, Scan};
pub use session::Session;
pub use stream::ChunkedReader;
