//! HD44780 character LCD module.
//!
//! Two layers:
//! - [driver]: the bus primitive ([HD44780Driver](driver::HD44780Driver)) that turns one command
//!   or data byte into E/RS/data line activity, with a [GPIO implementation](driver::GpioHD44780Driver)
//!   and a [simulated controller](driver::SimulatedHD44780).
//! - [Lcd]: the display itself. It maps lines and columns to DDRAM addresses, keeps the cursor,
//!   scroll offset and entry mode the controller can't report back, loads custom glyphs, draws a
//!   progress bar and prints numbers.
//!
//! Lines are numbered from 1, columns from 0, like on the glass.
//!
//! ```no_run
//! use charlcd::lcd::hd44780::{Lcd, LcdConfig};
//! use charlcd::lcd::hd44780::driver::SimulatedHD44780;
//!
//! let mut lcd = Lcd::new(SimulatedHD44780::new(), LcdConfig::default())?;
//! lcd.init()?;
//! lcd.put_str("Temp: ")?;
//! lcd.put_float(21.55, 1)?;
//! # Ok::<(), charlcd::lcd::hd44780::LcdError>(())
//! ```

pub mod driver;
mod cgram;
mod display;
mod format;
mod geometry;
mod mode;
mod progress;

use crate::GpioError;
pub use cgram::*;
pub use display::*;
pub use format::*;
pub use geometry::*;
pub use mode::*;
pub use progress::*;
use thiserror::Error;

/// Glyph width in pixels. Only the 5x8 font is supported.
pub const FONT_WIDTH: u8 = 5;
/// Glyph height in pixels.
pub const FONT_HEIGHT: u8 = 8;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("line {0} does not exist on this display")]
    InvalidLine(u8),
    #[error("column {column} is out of range, the display has {columns} columns")]
    ColumnOutOfRange { column: u8, columns: u8 },
    #[error("CGRAM slot {0} is not available")]
    InvalidSlot(u8),
    #[error("{0:#04x} is not a known entry or display mode")]
    InvalidMode(u8),
    #[error("progress bar level {level} is above the maximum of {max}")]
    InvalidLevel { level: u16, max: u16 },
    #[error("a {lines}x{columns} display can't be addressed by the controller")]
    InvalidGeometry { lines: u8, columns: u8 },
    #[error("a glyph has 8 rows, got {0}")]
    InvalidGlyph(usize),
    #[error("no progress bar is configured")]
    ProgressBarDisabled,
    #[error("bus fault: {0}")]
    BusFault(#[from] GpioError),
}

pub type LcdResult<T> = Result<T, LcdError>;

/// Everything that is fixed for the lifetime of one display.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LcdConfig {
    pub geometry: DisplayGeometry,
    /// Treat `\n`, `\r` and `\t` as cursor movement in [Lcd::put_str].
    pub formatted_output: bool,
    /// Distance between tab stops, in columns.
    pub tab_width: u8,
    pub progress_bar: Option<ProgressBarConfig>,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            geometry: DisplayGeometry::default(),
            formatted_output: true,
            tab_width: 4,
            progress_bar: None,
        }
    }
}

impl LcdConfig {
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn with_formatted_output(mut self, formatted_output: bool) -> Self {
        self.formatted_output = formatted_output;
        self
    }

    pub fn with_tab_width(mut self, tab_width: u8) -> Self {
        self.tab_width = tab_width;
        self
    }

    pub fn with_progress_bar(mut self, progress_bar: ProgressBarConfig) -> Self {
        self.progress_bar = Some(progress_bar);
        self
    }

    /// Checks the parts of the config the geometry doesn't check by itself.
    pub fn validate(&self) -> LcdResult<()> {
        if self.tab_width == 0 {
            return Err(LcdError::InvalidGeometry {
                lines: self.geometry.lines(),
                columns: self.geometry.columns(),
            });
        }
        if let Some(bar) = self.progress_bar {
            bar.validate(&self.geometry)?;
        }
        Ok(())
    }
}
