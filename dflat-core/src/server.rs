//! File server - the protocol state machine.

use log::{debug, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::{DflatError, DflatResult};
use crate::lines::{Direction, Line, LineInterface};
use crate::protocol::{directory_open_bytes, format_entry, Command, CR, NUL};
use crate::session::{Session, State};
use crate::store::FileStore;
use crate::transport::NibbleTransport;

/// Serves a `FileStore` to the host over a `LineInterface`.
pub struct FileServer<L: LineInterface, S: FileStore> {
    /// Byte transport over the port lines.
    transport: NibbleTransport<L>,
    /// Backing storage.
    store: S,
    /// Protocol state, open file, current directory.
    session: Session<S::Handle>,
    config: ServerConfig,
}

impl<L: LineInterface, S: FileStore> FileServer<L, S> {
    /// Create a server with default configuration.
    pub fn new(lines: L, store: S) -> Self {
        Self::with_config(lines, store, ServerConfig::default())
    }

    pub fn with_config(lines: L, store: S, config: ServerConfig) -> Self {
        Self {
            transport: NibbleTransport::new(lines, config.clock_stall()),
            store,
            session: Session::new(&config),
            config,
        }
    }

    pub fn state(&self) -> State {
        self.session.state
    }

    /// Current directory as the host sees it.
    pub fn current_path(&self) -> &str {
        self.session.path.current()
    }

    pub fn has_open_file(&self) -> bool {
        self.session.open_file.is_some()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lines(&self) -> &L {
        self.transport.lines()
    }

    pub fn lines_mut(&mut self) -> &mut L {
        self.transport.lines_mut()
    }

    /// Take the server apart, closing any open file.
    pub fn into_parts(mut self) -> (L, S) {
        self.release_file();
        (self.transport.into_lines(), self.store)
    }

    /// Serve forever.
    pub fn serve(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// Poll until `done` holds or `max_polls` runs out. Returns whether
    /// `done` was reached.
    pub fn poll_until<F>(&mut self, max_polls: usize, mut done: F) -> bool
    where
        F: FnMut(&Self) -> bool,
    {
        for _ in 0..max_polls {
            if done(self) {
                return true;
            }
            self.poll();
        }
        done(self)
    }

    /// Run one state, then re-check selection.
    pub fn poll(&mut self) {
        let state = self.session.state;
        if let Err(err) = self.dispatch(state) {
            self.recover(state, err);
        }

        if !matches!(self.session.state, State::Initialise | State::WaitForSelect)
            && !self.transport.is_selected()
        {
            info!("Deselected in {:?}", self.session.state);
            self.reset();
        }
    }

    fn dispatch(&mut self, state: State) -> DflatResult<()> {
        match state {
            State::Initialise => self.initialise(),
            State::WaitForSelect => self.wait_for_select(),
            State::GetCommand => self.get_command(),
            State::OpenRead => self.open_read(),
            State::OpenWrite => self.open_write(),
            State::LoadByte => self.load_byte(),
            State::SaveByte => self.save_byte(),
            State::Close => self.close(),
            State::Delete => self.delete(),
            State::DirectoryOpen => self.directory_open(),
            State::ListDirectory => self.list_directory(),
            State::AwaitDeselect => self.await_deselect(),
        }
    }

    fn set_state(&mut self, next: State) {
        if next != self.session.state {
            debug!("{:?} -> {:?}", self.session.state, next);
        }
        self.session.state = next;
    }

    /// Close the open file, if any. Close errors are logged, not raised:
    /// this runs on every abort path.
    fn release_file(&mut self) {
        if let Some(handle) = self.session.open_file.take() {
            let name = self.store.handle_name(&handle);
            debug!("Closing {}", name);
            if let Err(err) = self.store.close(handle) {
                warn!("Close of {} failed: {}", name, err);
            }
        }
    }

    /// The single way back to `Initialise`.
    fn reset(&mut self) {
        self.release_file();
        self.set_state(State::Initialise);
    }

    fn recover(&mut self, state: State, err: DflatError) {
        match err {
            DflatError::SelectionLost => debug!("Selection lost in {:?}", state),
            ref other => warn!("{:?}: {}", state, other),
        }
        if err.wants_busy_hold() {
            // Make the host time out and deselect
            self.transport.assert_busy();
            let hold = self.config.error_hold();
            self.transport.lines_mut().hold(hold);
        }
        self.reset();
    }

    /// Read a nul-terminated filename and resolve it against the current
    /// directory.
    fn read_filename(&mut self) -> DflatResult<String> {
        self.session.filename.clear();
        loop {
            let byte = self.transport.receive()?;
            if self.session.filename.push(byte)? {
                break;
            }
        }
        let name = self.session.filename.to_string_lossy();
        let path = self.session.path.resolve(&name);
        debug!("Filename {:?} -> {}", name, path);
        Ok(path)
    }

    fn initialise(&mut self) -> DflatResult<()> {
        self.release_file();
        self.transport.lines_mut().release_all();
        self.set_state(State::WaitForSelect);
        Ok(())
    }

    fn wait_for_select(&mut self) -> DflatResult<()> {
        if self.transport.is_selected() {
            info!("Selected");
            let lines = self.transport.lines_mut();
            lines.set_direction(Line::Ready, Direction::Output);
            lines.assert_ready();
            self.set_state(State::GetCommand);
        }
        Ok(())
    }

    fn get_command(&mut self) -> DflatResult<()> {
        let byte = self.transport.receive()?;
        if !self.transport.is_selected() {
            return Err(DflatError::SelectionLost);
        }
        let command = Command::try_from(byte).map_err(DflatError::UnknownCommand)?;
        debug!("Command {:?}", command);
        self.set_state(match command {
            Command::OpenRead => State::OpenRead,
            Command::OpenWrite => State::OpenWrite,
            Command::Close => State::Close,
            Command::Delete => State::Delete,
            Command::ListDirectory => State::ListDirectory,
        });
        Ok(())
    }

    /// Command 0: open for reading.
    fn open_read(&mut self) -> DflatResult<()> {
        let path = self.read_filename()?;
        let handle = self
            .store
            .open_read(&path)
            .map_err(|e| DflatError::OpenFailure {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let next = if self.store.handle_is_directory(&handle) {
            info!("Open directory {}", path);
            State::DirectoryOpen
        } else {
            info!("Load {}", path);
            State::LoadByte
        };
        self.session.open_file = Some(handle);
        self.set_state(next);
        Ok(())
    }

    /// Command 1: create or overwrite for writing.
    fn open_write(&mut self) -> DflatResult<()> {
        let path = self.read_filename()?;
        if self.store.exists(&path) {
            debug!("Replacing {}", path);
            self.store.remove(&path)?;
        }
        let handle = self
            .store
            .open_write(&path)
            .map_err(|e| DflatError::OpenFailure {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info!("Save {}", path);
        self.session.open_file = Some(handle);
        self.set_state(State::SaveByte);
        Ok(())
    }

    fn load_byte(&mut self) -> DflatResult<()> {
        if !self.transport.is_selected() {
            self.set_state(State::Close);
            return Ok(());
        }
        let handle = self
            .session
            .open_file
            .as_mut()
            .ok_or(DflatError::InvalidHandle)?;
        match self.store.read_byte(handle)? {
            Some(byte) => self.transport.send(byte),
            None => {
                debug!("End of file");
                self.release_file();
                self.set_state(State::AwaitDeselect);
                Ok(())
            }
        }
    }

    fn save_byte(&mut self) -> DflatResult<()> {
        let byte = self.transport.receive()?;
        let handle = self
            .session
            .open_file
            .as_mut()
            .ok_or(DflatError::InvalidHandle)?;
        self.store.write_byte(handle, byte)
    }

    /// Command 2: close.
    fn close(&mut self) -> DflatResult<()> {
        self.reset();
        Ok(())
    }

    /// Command 3: delete.
    fn delete(&mut self) -> DflatResult<()> {
        let path = self.read_filename()?;
        self.transport.assert_busy();
        if !self.store.exists(&path) {
            return Err(DflatError::FileNotFound(path));
        }
        self.store.remove(&path)?;
        info!("Deleted {}", path);
        self.reset();
        Ok(())
    }

    /// Send the fake catalog, then move into (or back to the root from) the
    /// opened directory.
    fn directory_open(&mut self) -> DflatResult<()> {
        for byte in directory_open_bytes() {
            self.transport.send(byte)?;
        }

        if self.session.filename.is_root_marker() {
            self.session.path.reset();
        } else {
            let handle = self
                .session
                .open_file
                .as_ref()
                .ok_or(DflatError::InvalidHandle)?;
            let name = self.store.handle_name(handle);
            self.session.path.descend(&name);
        }
        info!("Current directory {}", self.session.path.current());
        self.reset();
        Ok(())
    }

    /// Command 4: list the current directory.
    fn list_directory(&mut self) -> DflatResult<()> {
        self.transport.assert_busy();
        let dir = self.session.path.current().to_string();
        let listing = match self.store.list_directory(&dir) {
            Ok(listing) => Some(listing),
            Err(err) => {
                warn!("Cannot list {}: {}", dir, err);
                None
            }
        };

        let mut count = 0;
        for entry in listing.into_iter().flatten() {
            trace!("{:?}", entry);
            for byte in format_entry(&entry).bytes() {
                self.transport.send(byte)?;
            }
            count += 1;
        }
        self.transport.send(CR)?;
        self.transport.send(NUL)?;
        info!("Listed {} ({} entries)", dir, count);
        self.reset();
        Ok(())
    }

    fn await_deselect(&mut self) -> DflatResult<()> {
        self.transport.assert_busy();
        let hold = self.config.error_hold();
        self.transport.lines_mut().hold(hold);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::MemoryFileStore;

    /// Selected forever, clock never moves.
    #[derive(Default)]
    struct FrozenHost {
        ready: bool,
        holds: Vec<Duration>,
    }

    impl LineInterface for FrozenHost {
        fn set_direction(&mut self, _line: Line, _direction: Direction) {}

        fn read(&mut self, line: Line) -> bool {
            match line {
                Line::Clock => true,
                Line::Ready => self.ready,
                // Strobe and selects low
                _ => false,
            }
        }

        fn write(&mut self, line: Line, level: bool) {
            if line == Line::Ready {
                self.ready = level;
            }
        }

        fn hold(&mut self, duration: Duration) {
            self.holds.push(duration);
        }
    }

    #[test]
    fn test_starts_in_initialise() {
        let server = FileServer::new(FrozenHost::default(), MemoryFileStore::new());
        assert_eq!(server.state(), State::Initialise);
        assert_eq!(server.current_path(), "/");
        assert!(!server.has_open_file());
    }

    #[test]
    fn test_stalled_clock_recovers_with_busy_hold() {
        let config = ServerConfig {
            clock_stall_ms: Some(5),
            ..ServerConfig::default()
        };
        let mut server =
            FileServer::with_config(FrozenHost::default(), MemoryFileStore::new(), config);

        server.poll(); // Initialise
        server.poll(); // WaitForSelect -> GetCommand
        assert_eq!(server.state(), State::GetCommand);
        assert!(server.lines().ready);

        server.poll(); // GetCommand stalls
        assert_eq!(server.state(), State::Initialise);
        assert!(!server.lines().ready);
        assert_eq!(server.lines().holds, vec![Duration::from_millis(500)]);
    }
}
