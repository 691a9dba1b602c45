//! Wire protocol definitions.
//!
//! Everything here is fixed by the host client and must stay bit-exact.

pub mod catalog;

pub use catalog::{directory_open_bytes, format_entry, DIRECTORY_OPEN_LEN};

/// Command bytes sent by the host after selecting the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// 0<filename>: open for reading
    OpenRead = 0,
    /// 1<filename>: create/overwrite for writing
    OpenWrite = 1,
    /// 2: close the open file
    Close = 2,
    /// 3<filename>: delete
    Delete = 3,
    /// 4: list the current directory
    ListDirectory = 4,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::OpenRead),
            1 => Ok(Self::OpenWrite),
            2 => Ok(Self::Close),
            3 => Ok(Self::Delete),
            4 => Ok(Self::ListDirectory),
            _ => Err(value),
        }
    }
}

/// Carriage return, ends a listing and fills catalog blocks.
pub const CR: u8 = 0x0D;

/// Terminates filenames and listings.
pub const NUL: u8 = 0x00;

/// Filename the host sends to go back to the root directory.
pub const ROOT_MARKER: &[u8] = b"/";

/// Path separator appended when descending.
pub const SEPARATOR: char = '/';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::try_from(0), Ok(Command::OpenRead));
        assert_eq!(Command::try_from(1), Ok(Command::OpenWrite));
        assert_eq!(Command::try_from(2), Ok(Command::Close));
        assert_eq!(Command::try_from(3), Ok(Command::Delete));
        assert_eq!(Command::try_from(4), Ok(Command::ListDirectory));
        assert_eq!(Command::ListDirectory as u8, 4);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(Command::try_from(5), Err(5));
        assert_eq!(Command::try_from(7), Err(7));
        assert_eq!(Command::try_from(0xFF), Err(0xFF));
    }
}
