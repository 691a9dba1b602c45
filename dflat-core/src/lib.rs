//! dflat File Server Core
//!
//! This crate serves files to an Oric running dflat over its printer port:
//! - Nibble-clocked byte transport with ready/busy flow control
//! - Command state machine (open, close, delete, list, directory open)
//! - File stores backed by memory, a host directory or a ZIP disk image
//!
//! # Architecture
//!
//! The server uses a layered design:
//! - `LineInterface` trait: raw port lines, supplied by a board driver
//! - `NibbleTransport`: bytes over the clocked 4-bit bus
//! - `FileStore` trait: SD-card style storage
//! - `FileServer`: the protocol loop tying the two together
//!
//! `ScriptedHost` plays the computer's side of the port in software, which
//! is how the tests and the CLI exercise the server without hardware.

pub mod config;
pub mod error;
pub mod host;
pub mod image;
pub mod lines;
pub mod path;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod transport;

pub use config::{PinAssignment, ServerConfig};
pub use error::{DflatError, DflatResult};
pub use host::{Expect, HostSession, ScriptedHost, SessionEnd, SessionLog};
pub use image::{load_image, load_image_from_path};
pub use lines::{Direction, Line, LineInterface};
pub use path::{FilenameBuffer, PathTracker};
pub use protocol::Command;
pub use server::FileServer;
pub use session::State;
pub use store::{to_8_3, DirectoryEntry, FileStore, HostDirStore, MemoryFileStore};
pub use transport::NibbleTransport;
