//! Scripted host - a software stand-in for the computer on the other end.
//!
//! `ScriptedHost` implements `LineInterface` by playing the client's side
//! of the protocol: it selects the server, clocks bytes in both directions
//! whenever the server shows ready, and deselects when a session is over.
//! Each queued `HostSession` is one selection.
//!
//! The clock idles high. A byte transfer starts on the first clock poll
//! made while ready is high and runs four half-cycles (low, high, low,
//! high), one per poll. The server's busy-waits therefore drive the
//! simulation forward.

use std::collections::VecDeque;
use std::time::Duration;

use crate::lines::{Direction, Line, LineInterface};
use crate::protocol::{Command, CR, NUL};

/// When the host considers a session finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Nothing to receive; the session ends when the host runs out of
    /// bytes to send and the server asks for another.
    Nothing,
    /// Deselect after this many received bytes.
    Bytes(usize),
    /// Deselect once received data ends with this sequence.
    Terminator(Vec<u8>),
}

/// One selection's worth of traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSession {
    pub send: Vec<u8>,
    pub expect: Expect,
}

impl HostSession {
    /// A bare command byte.
    pub fn command(command: Command) -> Self {
        Self {
            send: vec![command as u8],
            expect: Expect::Nothing,
        }
    }

    /// A command followed by a nul-terminated filename.
    pub fn with_filename(command: Command, name: &str) -> Self {
        let mut send = vec![command as u8];
        send.extend_from_slice(name.as_bytes());
        send.push(NUL);
        Self {
            send,
            expect: Expect::Nothing,
        }
    }

    /// Raw bytes, for malformed traffic.
    pub fn raw(send: &[u8]) -> Self {
        Self {
            send: send.to_vec(),
            expect: Expect::Nothing,
        }
    }

    /// Load a file, expecting `len` bytes.
    pub fn load(name: &str, len: usize) -> Self {
        Self::with_filename(Command::OpenRead, name).expect(Expect::Bytes(len))
    }

    /// Save `data` to a file.
    pub fn save(name: &str, data: &[u8]) -> Self {
        Self::with_filename(Command::OpenWrite, name).then_send(data)
    }

    /// Read the current directory listing.
    pub fn list() -> Self {
        Self::command(Command::ListDirectory).expect(Expect::Terminator(vec![CR, NUL]))
    }

    /// Open a directory, consuming the catalog.
    pub fn open_dir(name: &str) -> Self {
        Self::load(name, crate::protocol::DIRECTORY_OPEN_LEN)
    }

    /// Append payload bytes.
    pub fn then_send(mut self, bytes: &[u8]) -> Self {
        self.send.extend_from_slice(bytes);
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Got everything it expected.
    Completed,
    /// Server asked for a byte the host did not have.
    Drained,
    /// Server held busy past the host's timeout.
    TimedOut,
    /// Deselected by `ScriptedHost::deselect`.
    Aborted,
}

/// What happened during one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    pub sent: usize,
    pub received: Vec<u8>,
    pub end: SessionEnd,
}

struct Active {
    outgoing: VecDeque<u8>,
    expect: Expect,
    sent: usize,
    received: Vec<u8>,
}

/// Software host driving the port lines.
pub struct ScriptedHost {
    pending: VecDeque<HostSession>,
    active: Option<Active>,
    logs: Vec<SessionLog>,
    /// Server has seen the lines deselected since the last session.
    release_seen: bool,
    timeout: Duration,
    holds: Vec<Duration>,

    clock: bool,
    phase: u8,
    outbound_byte: u8,
    presented: u8,
    inbound_low: u8,
    ready: bool,
    data_direction: Direction,
    server_data: [bool; 4],
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHost {
    /// Default host timeout is well under the server's error hold.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            active: None,
            logs: Vec::new(),
            release_seen: true,
            timeout: Self::DEFAULT_TIMEOUT,
            holds: Vec::new(),
            clock: true,
            phase: 0,
            outbound_byte: 0,
            presented: 0,
            inbound_low: 0,
            ready: false,
            data_direction: Direction::Input,
            server_data: [false; 4],
        }
    }

    /// Create with sessions queued.
    pub fn with_sessions<I: IntoIterator<Item = HostSession>>(sessions: I) -> Self {
        let mut host = Self::new();
        host.pending.extend(sessions);
        host
    }

    pub fn queue(&mut self, session: HostSession) {
        self.pending.push_back(session);
    }

    /// Finished sessions, oldest first.
    pub fn logs(&self) -> &[SessionLog] {
        &self.logs
    }

    /// Every busy-hold the server asked for.
    pub fn holds(&self) -> &[Duration] {
        &self.holds
    }

    /// Whether the host is currently selecting the server.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// No session running and none queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Drop the select lines now.
    pub fn deselect(&mut self) {
        self.finish(SessionEnd::Aborted);
    }

    fn finish(&mut self, end: SessionEnd) {
        if let Some(active) = self.active.take() {
            self.logs.push(SessionLog {
                sent: active.sent,
                received: active.received,
                end,
            });
        }
        self.clock = true;
        self.phase = 0;
        self.release_seen = false;
    }

    /// Strobe is the first line the server looks at when checking selection;
    /// sessions start and the release is noticed here.
    fn poll_strobe(&mut self) -> bool {
        if self.active.is_none() {
            if self.release_seen {
                if let Some(next) = self.pending.pop_front() {
                    self.active = Some(Active {
                        outgoing: next.send.into(),
                        expect: next.expect,
                        sent: 0,
                        received: Vec::new(),
                    });
                }
            } else {
                self.release_seen = true;
            }
        }
        self.active.is_none()
    }

    fn poll_clock(&mut self) -> bool {
        if self.active.is_none() {
            return self.clock;
        }
        if self.phase == 0 {
            if !self.ready {
                return self.clock;
            }
            if self.data_direction == Direction::Input {
                let next = self.active.as_mut().and_then(|a| a.outgoing.pop_front());
                match next {
                    Some(byte) => self.outbound_byte = byte,
                    None => {
                        self.finish(SessionEnd::Drained);
                        return self.clock;
                    }
                }
            }
        }

        self.phase += 1;
        self.clock = self.phase % 2 == 0;

        match (self.phase, self.data_direction) {
            (1, Direction::Input) => self.presented = self.outbound_byte & 0x0F,
            (3, Direction::Input) => self.presented = self.outbound_byte >> 4,
            (4, Direction::Input) => {
                self.phase = 0;
                if let Some(active) = self.active.as_mut() {
                    active.sent += 1;
                }
            }
            (2, Direction::Output) => self.inbound_low = self.latch_server_nibble(),
            (4, Direction::Output) => {
                self.phase = 0;
                let byte = self.inbound_low | (self.latch_server_nibble() << 4);
                self.take_inbound(byte);
            }
            _ => {}
        }
        self.clock
    }

    fn latch_server_nibble(&self) -> u8 {
        self.server_data
            .iter()
            .enumerate()
            .fold(0, |acc, (bit, &level)| acc | ((level as u8) << bit))
    }

    fn take_inbound(&mut self, byte: u8) {
        let done = match self.active.as_mut() {
            Some(active) => {
                active.received.push(byte);
                match &active.expect {
                    Expect::Nothing => false,
                    Expect::Bytes(n) => active.received.len() >= *n,
                    Expect::Terminator(seq) => active.received.ends_with(seq),
                }
            }
            None => false,
        };
        if done {
            self.finish(SessionEnd::Completed);
        }
    }
}

impl LineInterface for ScriptedHost {
    fn set_direction(&mut self, line: Line, direction: Direction) {
        match line {
            Line::Data0 => self.data_direction = direction,
            // A floating ready line reads as busy
            Line::Ready if direction == Direction::Input => self.ready = false,
            _ => {}
        }
    }

    fn read(&mut self, line: Line) -> bool {
        match line {
            Line::Clock => self.poll_clock(),
            Line::Strobe => self.poll_strobe(),
            Line::Select0 | Line::Select1 => self.active.is_none(),
            Line::Ready => self.ready,
            Line::Ack => true,
            data => {
                let bit = Line::DATA.iter().position(|&l| l == data).unwrap_or(0);
                match self.data_direction {
                    Direction::Input => self.presented & (1 << bit) != 0,
                    Direction::Output => self.server_data[bit],
                }
            }
        }
    }

    fn write(&mut self, line: Line, level: bool) {
        match line {
            Line::Ready => self.ready = level,
            Line::Data0 => self.server_data[0] = level,
            Line::Data1 => self.server_data[1] = level,
            Line::Data2 => self.server_data[2] = level,
            Line::Data3 => self.server_data[3] = level,
            _ => {}
        }
    }

    fn hold(&mut self, duration: Duration) {
        self.holds.push(duration);
        if self.active.is_some() && !self.ready && duration >= self.timeout {
            self.finish(SessionEnd::TimedOut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builders() {
        let load = HostSession::load("A.TXT", 3);
        assert_eq!(load.send, b"\0A.TXT\0");
        assert_eq!(load.expect, Expect::Bytes(3));

        let save = HostSession::save("B", b"xy");
        assert_eq!(save.send, b"\x01B\0xy");
        assert_eq!(save.expect, Expect::Nothing);

        let list = HostSession::list();
        assert_eq!(list.send, [Command::ListDirectory as u8]);
        assert_eq!(list.expect, Expect::Terminator(vec![CR, NUL]));
    }

    #[test]
    fn test_selects_only_after_release_seen() {
        let mut host =
            ScriptedHost::with_sessions([HostSession::raw(&[2]), HostSession::raw(&[2])]);
        assert!(host.is_selected());
        assert!(host.is_active());

        host.deselect();
        assert_eq!(host.logs()[0].end, SessionEnd::Aborted);
        // First look sees the release, the next starts the queued session
        assert!(!host.is_selected());
        assert!(host.is_selected());
        host.deselect();
        assert!(host.is_idle());
    }

    #[test]
    fn test_busy_hold_times_out() {
        let mut host = ScriptedHost::with_sessions([HostSession::raw(&[7])]);
        assert!(host.is_selected());
        host.assert_busy();
        host.hold(Duration::from_millis(10));
        assert!(host.is_active());
        host.hold(Duration::from_millis(500));
        assert!(!host.is_active());
        assert_eq!(host.logs()[0].end, SessionEnd::TimedOut);
        assert_eq!(host.holds().len(), 2);
    }

    #[test]
    fn test_ready_hold_does_not_time_out() {
        let mut host = ScriptedHost::with_sessions([HostSession::raw(&[7])]);
        assert!(host.is_selected());
        host.assert_ready();
        host.hold(Duration::from_secs(1));
        assert!(host.is_active());
    }

    #[test]
    fn test_clock_idles_until_ready() {
        let mut host = ScriptedHost::with_sessions([HostSession::raw(&[0x5A])]);
        assert!(host.is_selected());
        for _ in 0..4 {
            assert!(host.read(Line::Clock));
        }
        host.assert_ready();
        assert!(!host.read(Line::Clock));
        let low: Vec<bool> = Line::DATA.iter().map(|&l| host.read(l)).collect();
        assert_eq!(low, [false, true, false, true]);
    }
}
