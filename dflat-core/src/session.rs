//! Session state owned by the server loop.

use crate::config::ServerConfig;
use crate::path::{FilenameBuffer, PathTracker};

/// Protocol state. One state runs per poll of the server loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Release lines, drop any open file.
    Initialise,
    /// Idle until strobe and both selects go low.
    WaitForSelect,
    /// Read the command byte.
    GetCommand,
    /// Read a filename and open it for reading.
    OpenRead,
    /// Read a filename and create it for writing.
    OpenWrite,
    /// Send the next byte of the open file.
    LoadByte,
    /// Receive the next byte into the open file.
    SaveByte,
    /// Close the open file.
    Close,
    /// Read a filename and delete it.
    Delete,
    /// Send the catalog for an opened directory and enter it.
    DirectoryOpen,
    /// Send the current directory listing.
    ListDirectory,
    /// File ran out before the host stopped reading; stay busy until it
    /// gives up and deselects.
    AwaitDeselect,
}

/// Everything the protocol remembers between polls.
///
/// The open handle is `None` whenever the state is `Initialise` or
/// `WaitForSelect`.
pub(crate) struct Session<H> {
    pub(crate) state: State,
    pub(crate) open_file: Option<H>,
    pub(crate) path: PathTracker,
    /// Last filename received from the host.
    pub(crate) filename: FilenameBuffer,
}

impl<H> Session<H> {
    pub(crate) fn new(config: &ServerConfig) -> Self {
        Self {
            state: State::Initialise,
            open_file: None,
            path: PathTracker::new(config.root_path.clone()),
            filename: FilenameBuffer::new(config.filename_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let config = ServerConfig {
            root_path: "/CARD/".to_string(),
            filename_capacity: 13,
            ..ServerConfig::default()
        };
        let session: Session<()> = Session::new(&config);
        assert_eq!(session.state, State::Initialise);
        assert!(session.open_file.is_none());
        assert_eq!(session.path.current(), "/CARD/");
        assert_eq!(session.filename.capacity(), 13);
    }
}
