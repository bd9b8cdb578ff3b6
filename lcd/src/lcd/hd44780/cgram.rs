use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::lcd::hd44780::{
    CGRAM_SIZE, EntryMode, FONT_HEIGHT, FONT_WIDTH, Lcd, LcdError, LcdResult, RamPointer,
};
use log::debug;

/// Number of custom characters the controller can hold.
pub const CGRAM_SLOTS: u8 = 8;
/// Slot holding the partially filled progress bar cell while a bar is configured.
pub const PROGRESS_BAR_SLOT: u8 = 5;

const ROW_MASK: u8 = (1 << FONT_WIDTH) - 1;

/// A 5x8 custom character, top row first. Bit 4 of each row is the leftmost pixel.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Glyph([u8; FONT_HEIGHT as usize]);

impl Glyph {
    /// Builds a glyph, dropping the bits of each row that fall outside the 5 pixel font.
    pub const fn new(rows: [u8; FONT_HEIGHT as usize]) -> Self {
        let mut masked = [0; FONT_HEIGHT as usize];
        let mut i = 0;
        while i < masked.len() {
            masked[i] = rows[i] & ROW_MASK;
            i += 1;
        }
        Self(masked)
    }

    /// A glyph with the `columns` leftmost pixel columns lit in every row.
    pub const fn solid_columns(columns: u8) -> Self {
        let columns = if columns > FONT_WIDTH { FONT_WIDTH } else { columns };
        let row = (ROW_MASK << (FONT_WIDTH - columns)) & ROW_MASK;
        Self([row; FONT_HEIGHT as usize])
    }

    pub fn rows(&self) -> &[u8; FONT_HEIGHT as usize] {
        &self.0
    }
}

impl From<[u8; FONT_HEIGHT as usize]> for Glyph {
    fn from(rows: [u8; FONT_HEIGHT as usize]) -> Self {
        Self::new(rows)
    }
}

impl TryFrom<&[u8]> for Glyph {
    type Error = LcdError;

    fn try_from(rows: &[u8]) -> Result<Self, Self::Error> {
        let rows: [u8; FONT_HEIGHT as usize] =
            rows.try_into().map_err(|_| LcdError::InvalidGlyph(rows.len()))?;
        Ok(Self::new(rows))
    }
}

impl<D: HD44780Driver> Lcd<D> {
    /// Stores a custom character in one of the 8 CGRAM slots; print it with its slot number as
    /// the character code.
    ///
    /// While a progress bar is configured, [PROGRESS_BAR_SLOT] is taken and refused.
    ///
    /// Afterwards the address counter is left in CGRAM, so call [Self::goto] before printing
    /// text again.
    pub fn load_char(&mut self, glyph: &Glyph, slot: u8) -> LcdResult<()> {
        self.check_slot(slot)?;
        self.write_glyph(glyph, slot)
    }

    /// [Self::load_char], then prints the glyph at `line`, `column`.
    ///
    /// The cursor ends up after the printed cell, as with [Self::put_char].
    pub fn draw_char(&mut self, glyph: &Glyph, slot: u8, line: u8, column: u8) -> LcdResult<()> {
        self.check_slot(slot)?;
        self.config.geometry.to_address(line, column)?;

        self.write_glyph(glyph, slot)?;
        self.goto(line, column)?;
        self.put_char(slot)
    }

    pub fn is_slot_reserved(&self, slot: u8) -> bool {
        slot == PROGRESS_BAR_SLOT && self.config.progress_bar.is_some()
    }

    fn check_slot(&self, slot: u8) -> LcdResult<()> {
        if slot >= CGRAM_SLOTS || self.is_slot_reserved(slot) {
            return Err(LcdError::InvalidSlot(slot));
        }
        Ok(())
    }

    /// Writes the 8 rows of a slot, top to bottom, whatever the entry direction is.
    pub(super) fn write_glyph(&mut self, glyph: &Glyph, slot: u8) -> LcdResult<()> {
        let decrementing = self.entry_mode.direction == CursorDirection::Left;
        if decrementing {
            let increment = EntryMode {
                direction: CursorDirection::Right,
                ..self.entry_mode
            };
            self.driver.send_command(increment.to_command())?;
        }

        let start = slot * FONT_HEIGHT;
        self.driver.set_cgram_address(start)?;
        for &row in glyph.rows() {
            self.driver.send_data(row)?;
        }
        self.pointer = RamPointer::Cgram((start + FONT_HEIGHT) % CGRAM_SIZE);

        if decrementing {
            self.driver.send_command(self.entry_mode.to_command())?;
        }
        debug!("Glyph {:?} loaded into slot {}", glyph.rows(), slot);
        Ok(())
    }
}
