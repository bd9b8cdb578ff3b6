//! Low-level HD44780 bus interface.
//!
//! [HD44780Driver] is the single primitive the [display layer](super::Lcd) is built on: it sends
//! one command or data byte and returns once the controller had time to execute it. Everything
//! above it (addresses, cursor bookkeeping, glyphs) lives in the display layer, so the same
//! display code runs on the [GPIO bus](GpioHD44780Driver) or on the
//! [simulated controller](SimulatedHD44780).

mod gpio;
mod sim;

use crate::{GpioError, GpioResult};
pub use gpio::*;
pub use sim::*;
use std::fmt::Debug;

/// Clear display. Fills DDRAM with spaces and sets the address counter to `0`.
pub const CMD_CLEAR_DISPLAY: u8 = 0b00000001;
/// Return home. Sets the address counter to `0` and undoes any display shift.
pub const CMD_RETURN_HOME: u8 = 0b00000010;
/// Entry mode set, `000001IS`.
pub const CMD_ENTRY_MODE: u8 = 0b00000100;
/// Display control, `00001DCB`.
pub const CMD_DISPLAY_CONTROL: u8 = 0b00001000;
/// Cursor or display shift, `0001SR??`.
pub const CMD_SHIFT: u8 = 0b00010000;
/// Function set, `001DNF??`.
pub const CMD_FUNCTION_SET: u8 = 0b00100000;
/// Set CGRAM address, `01AAAAAA`.
pub const CMD_SET_CGRAM_ADDRESS: u8 = 0b01000000;
/// Set DDRAM address, `1AAAAAAA`.
pub const CMD_SET_DDRAM_ADDRESS: u8 = 0b10000000;

/// The HD44780 command set on top of two raw transfers.
///
/// Only [Self::init], [Self::send_command] and [Self::send_data] need implementing; every other
/// method encodes one command byte and sends it. Entry mode and display control bytes come from
/// [EntryMode](super::EntryMode) and [DisplayControl](super::DisplayControl). Implementations must honour the controller's
/// execution times before returning, there is no busy flag polling above this trait.
pub trait HD44780Driver: Debug {
    /// Runs the power-on synchronisation for the bus width and sends the function set for the
    /// given line mode with the 5x8 font.
    fn init(&mut self, multiline: bool) -> GpioResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CMD_CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and resets the display shift.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(CMD_RETURN_HOME)
    }

    /// Moves the cursor or shifts the display by one cell.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = CMD_SHIFT;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface data length, the number of display lines and the font.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = CMD_FUNCTION_SET;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address. Following data writes go to the glyph memory.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(CMD_SET_CGRAM_ADDRESS | address)
    }

    /// Sets the DDRAM address. Following data writes go to the display memory.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(CMD_SET_DDRAM_ADDRESS | address)
    }

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

impl<T: HD44780Driver + ?Sized> HD44780Driver for &mut T {
    fn init(&mut self, multiline: bool) -> GpioResult<()> {
        (**self).init(multiline)
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        (**self).send_command(command)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        (**self).send_data(data)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor (or the display) to the left.
    Left,
    /// Moves the cursor (or the display) to the right.
    Right,
}

impl CursorDirection {
    /// The signed step this direction applies to an address or offset.
    pub fn step(self) -> i16 {
        match self {
            CursorDirection::Left => -1,
            CursorDirection::Right => 1,
        }
    }
}
