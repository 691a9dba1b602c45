//! Line interface abstraction for the printer port.
//!
//! The `LineInterface` trait is the only thing the server knows about the
//! physical port. A board driver implements it on real pins; `ScriptedHost`
//! implements it in software for tests and the CLI.
//!
//! Levels are electrical: `true` is high. Select and strobe lines are
//! active low, the ready line is high for ready and low for busy.

use std::time::Duration;

/// One signal on the printer port connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Host driven nibble clock (PA0).
    Clock,
    /// Nibble data bit 0 (PA1).
    Data0,
    /// Nibble data bit 1 (PA2).
    Data1,
    /// Nibble data bit 2 (PA3).
    Data2,
    /// Nibble data bit 3 (PA4).
    Data3,
    /// Server ready/busy output (PA5).
    Ready,
    /// Select, active low (PA6).
    Select0,
    /// Select, active low (PA7).
    Select1,
    /// Printer strobe, active low.
    Strobe,
    /// Printer acknowledge, unused.
    Ack,
}

impl Line {
    /// The four nibble data lines, bit 0 first.
    pub const DATA: [Line; 4] = [Line::Data0, Line::Data1, Line::Data2, Line::Data3];

    /// Every line on the connector.
    pub const ALL: [Line; 10] = [
        Line::Clock,
        Line::Data0,
        Line::Data1,
        Line::Data2,
        Line::Data3,
        Line::Ready,
        Line::Select0,
        Line::Select1,
        Line::Strobe,
        Line::Ack,
    ];
}

/// Pin direction as seen from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Raw access to the port lines.
pub trait LineInterface: Send {
    /// Configure a line as input or output.
    fn set_direction(&mut self, line: Line, direction: Direction);

    /// Sample the level of a line.
    fn read(&mut self, line: Line) -> bool;

    /// Drive a line (only meaningful for outputs).
    fn write(&mut self, line: Line, level: bool);

    /// Hold the current line state for a while. Default implementation sleeps.
    fn hold(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Tell the host it may clock the next byte.
    fn assert_ready(&mut self) {
        self.write(Line::Ready, true);
    }

    /// Tell the host to wait.
    fn assert_busy(&mut self) {
        self.write(Line::Ready, false);
    }

    /// Strobe and both selects low means the host is talking to us.
    fn is_selected(&mut self) -> bool {
        !self.read(Line::Strobe) && !self.read(Line::Select0) && !self.read(Line::Select1)
    }

    /// Float every line so the port does not fight other devices on it.
    fn release_all(&mut self) {
        for line in Line::ALL {
            self.set_direction(line, Direction::Input);
        }
    }

    /// Point the four data lines one way.
    fn set_data_direction(&mut self, direction: Direction) {
        for line in Line::DATA {
            self.set_direction(line, direction);
        }
    }
}
