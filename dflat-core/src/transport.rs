//! Nibble transport - byte exchange over the clocked 4-bit bus.
//!
//! The host owns the clock. A byte is two nibbles, low first; each is valid
//! on the clock's low to high edge. When the server sends, it puts the
//! nibble on the data lines while the clock is low and keeps it there
//! across the rising edge. When it receives, it samples right after the
//! edge.
//!
//! This is the only place that spins on a line. Every wait is abandoned as
//! soon as the host deselects. A wall-clock stall limit can be configured
//! for hardware that may lose its clock while still selecting us; by
//! default only the host bounds the wait.

use std::time::{Duration, Instant};

use log::trace;

use crate::error::{DflatError, DflatResult};
use crate::lines::{Direction, Line, LineInterface};

/// Split a byte into (low, high) nibbles in wire order.
pub fn split_nibbles(byte: u8) -> (u8, u8) {
    (byte & 0x0F, byte >> 4)
}

/// Reassemble a byte from its wire nibbles.
pub fn join_nibbles(low: u8, high: u8) -> u8 {
    (low & 0x0F) | ((high & 0x0F) << 4)
}

/// Byte-level view of the port.
pub struct NibbleTransport<L> {
    lines: L,
    stall_limit: Option<Duration>,
}

impl<L: LineInterface> NibbleTransport<L> {
    pub fn new(lines: L, stall_limit: Option<Duration>) -> Self {
        Self { lines, stall_limit }
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    pub fn into_lines(self) -> L {
        self.lines
    }

    /// Is the host addressing us right now?
    pub fn is_selected(&mut self) -> bool {
        self.lines.is_selected()
    }

    pub fn assert_ready(&mut self) {
        self.lines.assert_ready();
    }

    pub fn assert_busy(&mut self) {
        self.lines.assert_busy();
    }

    /// Ready, receive one byte, busy.
    pub fn receive(&mut self) -> DflatResult<u8> {
        self.lines.assert_ready();
        let result = self.read_byte();
        self.lines.assert_busy();
        result
    }

    /// Ready, send one byte, busy.
    pub fn send(&mut self, byte: u8) -> DflatResult<()> {
        self.lines.assert_ready();
        let result = self.write_byte(byte);
        self.lines.assert_busy();
        result
    }

    /// Clock one byte in from the host.
    pub fn read_byte(&mut self) -> DflatResult<u8> {
        if !self.lines.is_selected() {
            return Err(DflatError::SelectionLost);
        }
        self.lines.set_data_direction(Direction::Input);

        let low = self.clock_in()?;
        let high = self.clock_in()?;
        let byte = join_nibbles(low, high);
        trace!("rx {:#04X}", byte);
        Ok(byte)
    }

    /// Clock one byte out to the host.
    pub fn write_byte(&mut self, byte: u8) -> DflatResult<()> {
        if !self.lines.is_selected() {
            return Err(DflatError::SelectionLost);
        }
        self.lines.set_data_direction(Direction::Output);

        let (low, high) = split_nibbles(byte);
        self.clock_out(low)?;
        self.clock_out(high)?;
        trace!("tx {:#04X}", byte);
        Ok(())
    }

    fn clock_in(&mut self) -> DflatResult<u8> {
        self.wait_clock(false)?;
        self.wait_clock(true)?;
        Ok(self.sample_nibble())
    }

    fn clock_out(&mut self, nibble: u8) -> DflatResult<()> {
        self.wait_clock(false)?;
        self.drive_nibble(nibble);
        self.wait_clock(true)
    }

    fn sample_nibble(&mut self) -> u8 {
        let mut nibble = 0;
        for (bit, line) in Line::DATA.into_iter().enumerate() {
            if self.lines.read(line) {
                nibble |= 1 << bit;
            }
        }
        nibble
    }

    fn drive_nibble(&mut self, nibble: u8) {
        for (bit, line) in Line::DATA.into_iter().enumerate() {
            self.lines.write(line, nibble & (1 << bit) != 0);
        }
    }

    /// Spin until the clock reads `level`.
    fn wait_clock(&mut self, level: bool) -> DflatResult<()> {
        let started = Instant::now();
        while self.lines.read(Line::Clock) != level {
            if !self.lines.is_selected() {
                return Err(DflatError::SelectionLost);
            }
            if let Some(limit) = self.stall_limit {
                if started.elapsed() >= limit {
                    return Err(DflatError::ClockStalled { line: Line::Clock });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_round_trip() {
        for byte in 0..=255u8 {
            let (low, high) = split_nibbles(byte);
            assert!(low < 16 && high < 16);
            assert_eq!(join_nibbles(low, high), byte);
        }
    }

    #[test]
    fn test_nibble_order() {
        assert_eq!(split_nibbles(0xA5), (0x5, 0xA));
        assert_eq!(join_nibbles(0x3, 0xC), 0xC3);
    }

    /// Lines with a clock that never moves.
    struct StuckClock {
        selected: bool,
    }

    impl LineInterface for StuckClock {
        fn set_direction(&mut self, _line: Line, _direction: Direction) {}

        fn read(&mut self, line: Line) -> bool {
            match line {
                Line::Clock => true,
                Line::Strobe | Line::Select0 | Line::Select1 => !self.selected,
                _ => false,
            }
        }

        fn write(&mut self, _line: Line, _level: bool) {}
    }

    #[test]
    fn test_stalled_clock_is_bounded() {
        let limit = Some(Duration::from_millis(5));
        let mut transport = NibbleTransport::new(StuckClock { selected: true }, limit);
        assert!(matches!(
            transport.read_byte(),
            Err(DflatError::ClockStalled { line: Line::Clock })
        ));
    }

    #[test]
    fn test_deselected_transfers_abort() {
        let mut transport = NibbleTransport::new(StuckClock { selected: false }, None);
        assert!(matches!(transport.read_byte(), Err(DflatError::SelectionLost)));
        assert!(matches!(transport.write_byte(0x41), Err(DflatError::SelectionLost)));
    }

    /// Selected host that leaves the clock idle for a while, then clocks
    /// one edge per read.
    struct PausingHost {
        pause: u64,
        reads: u64,
    }

    impl LineInterface for PausingHost {
        fn set_direction(&mut self, _line: Line, _direction: Direction) {}

        fn read(&mut self, line: Line) -> bool {
            match line {
                Line::Clock => {
                    self.reads += 1;
                    self.reads <= self.pause || (self.reads - self.pause) % 2 == 0
                }
                Line::Data0 => true,
                _ => false,
            }
        }

        fn write(&mut self, _line: Line, _level: bool) {}
    }

    #[test]
    fn test_slow_host_is_not_a_stall() {
        let host = PausingHost {
            pause: 2_000_000,
            reads: 0,
        };
        let stall = crate::config::ServerConfig::default().clock_stall();
        let mut transport = NibbleTransport::new(host, stall);
        assert_eq!(transport.read_byte().unwrap(), 0x11);
    }

    #[test]
    fn test_stall_limit_is_wall_clock() {
        let host = PausingHost {
            pause: 2_000_000,
            reads: 0,
        };
        let mut transport = NibbleTransport::new(host, Some(Duration::from_secs(30)));
        assert_eq!(transport.read_byte().unwrap(), 0x11);
    }
}
