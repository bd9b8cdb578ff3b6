use crate::lcd::hd44780::driver::{CMD_DISPLAY_CONTROL, CMD_ENTRY_MODE, CursorDirection};
use crate::lcd::hd44780::LcdError;

/// Right to left, display does not follow.
pub const ENTRY_MODE_DEC_NO_SHIFT: u8 = 0x04;
/// Right to left, display shifts with every write.
pub const ENTRY_MODE_DEC_WITH_SHIFT: u8 = 0x05;
/// Left to right, display does not follow.
pub const ENTRY_MODE_INC_NO_SHIFT: u8 = 0x06;
/// Left to right, display shifts with every write.
pub const ENTRY_MODE_INC_WITH_SHIFT: u8 = 0x07;

pub const VIEW_MODE_DISP_ON_BLK_ON_CRS_ON: u8 = 0x0F;
pub const VIEW_MODE_DISP_ON_BLK_OFF_CRS_ON: u8 = 0x0E;
pub const VIEW_MODE_DISP_ON_BLK_ON_CRS_OFF: u8 = 0x0D;
pub const VIEW_MODE_DISP_ON_BLK_OFF_CRS_OFF: u8 = 0x0C;
pub const VIEW_MODE_DISP_OFF_BLK_OFF_CRS_OFF: u8 = 0x08;

/// How the address counter moves after each write.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryMode {
    pub direction: CursorDirection,
    /// Shift the visible window along with the cursor.
    pub shift_display: bool,
}

impl Default for EntryMode {
    fn default() -> Self {
        Self {
            direction: CursorDirection::Right,
            shift_display: false,
        }
    }
}

impl EntryMode {
    pub fn to_command(self) -> u8 {
        let mut command = CMD_ENTRY_MODE;
        if self.direction == CursorDirection::Right {
            command |= 0b10;
        }
        if self.shift_display {
            command |= 0b01;
        }
        command
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayControl {
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
}

impl Default for DisplayControl {
    /// Display on, no cursor.
    fn default() -> Self {
        Self {
            display_on: true,
            cursor_on: false,
            blink_on: false,
        }
    }
}

impl DisplayControl {
    pub fn to_command(self) -> u8 {
        let mut command = CMD_DISPLAY_CONTROL;
        if self.display_on {
            command |= 0b100;
        }
        if self.cursor_on {
            command |= 0b010;
        }
        if self.blink_on {
            command |= 0b001;
        }
        command
    }
}

/// One of the modes accepted by [Lcd::set_mode](super::Lcd::set_mode).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Entry(EntryMode),
    Display(DisplayControl),
}

impl Mode {
    pub fn to_command(self) -> u8 {
        match self {
            Mode::Entry(entry) => entry.to_command(),
            Mode::Display(display) => display.to_command(),
        }
    }
}

impl From<EntryMode> for Mode {
    fn from(entry: EntryMode) -> Self {
        Mode::Entry(entry)
    }
}

impl From<DisplayControl> for Mode {
    fn from(display: DisplayControl) -> Self {
        Mode::Display(display)
    }
}

impl TryFrom<u8> for Mode {
    type Error = LcdError;

    /// Accepts the `ENTRY_MODE_*` and `VIEW_MODE_*` patterns. A display that is off has no
    /// visible cursor, so only `0x08` is accepted from the display-off half.
    fn try_from(param: u8) -> Result<Self, Self::Error> {
        match param {
            ENTRY_MODE_DEC_NO_SHIFT..=ENTRY_MODE_INC_WITH_SHIFT => Ok(Mode::Entry(EntryMode {
                direction: if param & 0b10 != 0 {
                    CursorDirection::Right
                } else {
                    CursorDirection::Left
                },
                shift_display: param & 0b01 != 0,
            })),
            VIEW_MODE_DISP_OFF_BLK_OFF_CRS_OFF
            | VIEW_MODE_DISP_ON_BLK_OFF_CRS_OFF..=VIEW_MODE_DISP_ON_BLK_ON_CRS_ON => {
                Ok(Mode::Display(DisplayControl {
                    display_on: param & 0b100 != 0,
                    cursor_on: param & 0b010 != 0,
                    blink_on: param & 0b001 != 0,
                }))
            }
            _ => Err(LcdError::InvalidMode(param)),
        }
    }
}
