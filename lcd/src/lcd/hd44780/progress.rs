use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::{
    DisplayGeometry, FONT_WIDTH, Glyph, Lcd, LcdError, LcdResult, PROGRESS_BAR_SLOT, Position,
    RamPointer,
};
use log::debug;

/// ROM character with every pixel lit, used for full cells.
pub const FULL_BLOCK: u8 = 0xFF;
const EMPTY_CELL: u8 = b' ';

/// Where the progress bar sits and how it behaves.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProgressBarConfig {
    pub line: u8,
    pub start_column: u8,
    /// Width in cells.
    pub cells: u8,
    /// Whether a lower level than the current one is drawn. If not, it is ignored.
    pub allow_regress: bool,
}

impl ProgressBarConfig {
    pub fn new(line: u8, start_column: u8, cells: u8) -> Self {
        Self {
            line,
            start_column,
            cells,
            allow_regress: true,
        }
    }

    pub fn with_regress(mut self, allow_regress: bool) -> Self {
        self.allow_regress = allow_regress;
        self
    }

    /// The level of a completely filled bar, one step per pixel column.
    pub fn max_load(&self) -> u16 {
        self.cells as u16 * FONT_WIDTH as u16
    }

    pub fn validate(&self, geometry: &DisplayGeometry) -> LcdResult<()> {
        geometry.line_start(self.line)?;
        let end = self.start_column as u16 + self.cells as u16;
        if self.cells == 0 || end > geometry.columns() as u16 {
            return Err(LcdError::ColumnOutOfRange {
                column: end.saturating_sub(1).min(u8::MAX as u16) as u8,
                columns: geometry.columns(),
            });
        }
        Ok(())
    }
}

/// What one bar cell shows at a given level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CellFill {
    Empty,
    /// The number of lit pixel columns, `1..FONT_WIDTH`.
    Partial(u8),
    Full,
}

impl CellFill {
    pub fn at(level: u16, cell: u8) -> Self {
        let full_cells = level / FONT_WIDTH as u16;
        let partial_columns = (level % FONT_WIDTH as u16) as u8;
        match cell as u16 {
            c if c < full_cells => CellFill::Full,
            c if c == full_cells && partial_columns > 0 => CellFill::Partial(partial_columns),
            _ => CellFill::Empty,
        }
    }
}

impl<D: HD44780Driver> Lcd<D> {
    /// The current fill level, or `None` without a configured bar.
    pub fn bar_level(&self) -> Option<u16> {
        self.config.progress_bar.map(|_| self.bar_level.unwrap_or(0))
    }

    /// Fills the bar to `level` pixel columns out of [ProgressBarConfig::max_load].
    ///
    /// Only the cells that change are rewritten, except on the first draw after
    /// [Lcd::init] or [Lcd::clear], which writes every cell. The one partially filled cell is
    /// drawn with a glyph built in [PROGRESS_BAR_SLOT]. The cursor is put back where it was.
    pub fn draw_bar(&mut self, level: u16) -> LcdResult<()> {
        let bar = self.config.progress_bar.ok_or(LcdError::ProgressBarDisabled)?;
        let max = bar.max_load();
        if level > max {
            return Err(LcdError::InvalidLevel { level, max });
        }
        if self.bar_level.is_some_and(|current| level < current) && !bar.allow_regress {
            debug!("Progress bar regress to {} ignored", level);
            return Ok(());
        }
        self.render_bar(self.bar_level, level)
    }

    /// Empties the bar, also when regressing is not allowed.
    pub fn clear_bar(&mut self) -> LcdResult<()> {
        self.config.progress_bar.ok_or(LcdError::ProgressBarDisabled)?;
        self.render_bar(self.bar_level, 0)
    }

    /// Rewrites every bar cell, e.g. after text was printed over the bar.
    pub fn redraw_bar(&mut self) -> LcdResult<()> {
        self.config.progress_bar.ok_or(LcdError::ProgressBarDisabled)?;
        self.render_bar(None, self.bar_level.unwrap_or(0))
    }

    /// Draws `level` over what `previous` left on screen; `None` redraws every cell.
    fn render_bar(&mut self, previous: Option<u16>, level: u16) -> LcdResult<()> {
        let Some(bar) = self.config.progress_bar else {
            return Err(LcdError::ProgressBarDisabled);
        };
        let saved = self.pointer;

        let partial_columns = (level % FONT_WIDTH as u16) as u8;
        let glyph_stale =
            previous.is_none_or(|previous| (previous % FONT_WIDTH as u16) as u8 != partial_columns);
        if partial_columns > 0 && glyph_stale {
            self.write_glyph(&Glyph::solid_columns(partial_columns), PROGRESS_BAR_SLOT)?;
        }

        for cell in 0..bar.cells {
            let fill = CellFill::at(level, cell);
            if previous.is_some_and(|previous| CellFill::at(previous, cell) == fill) {
                continue;
            }
            let position = Position::new(bar.line, bar.start_column + cell);
            if self.pointer != RamPointer::Ddram(position) {
                self.goto(position.line, position.column)?;
            }
            self.put_char(match fill {
                CellFill::Empty => EMPTY_CELL,
                CellFill::Partial(_) => PROGRESS_BAR_SLOT,
                CellFill::Full => FULL_BLOCK,
            })?;
        }

        if self.pointer != saved {
            match saved {
                RamPointer::Ddram(position) => self.goto(position.line, position.column)?,
                RamPointer::Cgram(address) => self.goto_cgram(address)?,
            }
        }

        self.bar_level = Some(level);
        debug!("Progress bar at {}/{}", level, bar.max_load());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::display::tests::{lcd, lcd_16x2};
    use crate::lcd::hd44780::driver::{BusTransaction, SimulatedHD44780};
    use crate::lcd::hd44780::{ENTRY_MODE_DEC_NO_SHIFT, LcdConfig};

    fn bar_lcd(bar: ProgressBarConfig) -> Lcd<SimulatedHD44780> {
        lcd(LcdConfig::default().with_progress_bar(bar))
    }

    /// The bar cells as codes, read back from the simulated DDRAM.
    fn cells(lcd: &Lcd<SimulatedHD44780>) -> Vec<u8> {
        let bar = lcd.config().progress_bar.unwrap();
        (0..bar.cells)
            .map(|cell| {
                let address = lcd
                    .geometry()
                    .to_address(bar.line, bar.start_column + cell)
                    .unwrap();
                lcd.driver().ddram(address)
            })
            .collect()
    }

    fn expected(full: usize, partial: bool, cells: usize) -> Vec<u8> {
        let mut codes = vec![FULL_BLOCK; full];
        if partial {
            codes.push(PROGRESS_BAR_SLOT);
        }
        codes.resize(cells, b' ');
        codes
    }

    #[test]
    fn cell_fill_derives_from_level() {
        assert_eq!(CellFill::at(0, 0), CellFill::Empty);
        assert_eq!(CellFill::at(7, 0), CellFill::Full);
        assert_eq!(CellFill::at(7, 1), CellFill::Partial(2));
        assert_eq!(CellFill::at(7, 2), CellFill::Empty);
        assert_eq!(CellFill::at(10, 1), CellFill::Full);
        assert_eq!(CellFill::at(10, 2), CellFill::Empty);
    }

    #[test]
    fn empty_full_half() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(2, 0, 16));
        let max = lcd.config().progress_bar.unwrap().max_load();
        assert_eq!(max, 80);

        lcd.draw_bar(0).unwrap();
        assert_eq!(cells(&lcd), expected(0, false, 16));

        lcd.draw_bar(max).unwrap();
        assert_eq!(cells(&lcd), expected(16, false, 16));

        lcd.draw_bar(max / 2).unwrap();
        assert_eq!(cells(&lcd), expected(8, false, 16));
        assert_eq!(lcd.bar_level(), Some(40));
    }

    #[test]
    fn partial_cell_uses_the_reserved_glyph() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(2, 2, 10));
        lcd.draw_bar(13).unwrap();
        assert_eq!(cells(&lcd), expected(2, true, 10));
        assert_eq!(
            lcd.driver().glyph(PROGRESS_BAR_SLOT),
            [0b11100; 8]
        );
        assert_eq!(lcd.driver().ddram(0x41), b' ');
    }

    #[test]
    fn decreasing_levels_are_drawn() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        for level in [20, 17, 9, 3, 0] {
            lcd.draw_bar(level).unwrap();
            let full = (level / 5) as usize;
            assert_eq!(cells(&lcd), expected(full, level % 5 > 0, 4), "level {}", level);
            if level % 5 > 0 {
                assert_eq!(
                    lcd.driver().glyph(PROGRESS_BAR_SLOT),
                    *Glyph::solid_columns((level % 5) as u8).rows()
                );
            }
        }
    }

    #[test]
    fn regress_can_be_disabled() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4).with_regress(false));
        lcd.draw_bar(15).unwrap();
        lcd.draw_bar(5).unwrap();
        assert_eq!(lcd.bar_level(), Some(15));
        assert_eq!(cells(&lcd), expected(3, false, 4));

        lcd.clear_bar().unwrap();
        assert_eq!(lcd.bar_level(), Some(0));
        assert_eq!(cells(&lcd), expected(0, false, 4));
    }

    #[test]
    fn level_above_max_is_rejected() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        assert_eq!(
            lcd.draw_bar(21),
            Err(LcdError::InvalidLevel { level: 21, max: 20 })
        );
        assert!(lcd.driver().transactions().is_empty());
    }

    #[test]
    fn only_changed_cells_are_rewritten() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 16));
        lcd.draw_bar(10).unwrap();
        lcd.driver_mut().take_transactions();

        lcd.draw_bar(15).unwrap();
        let data: Vec<u8> = lcd
            .driver()
            .transactions()
            .iter()
            .filter_map(|t| match t {
                BusTransaction::Data(d) => Some(*d),
                BusTransaction::Command(_) => None,
            })
            .collect();
        assert_eq!(data, vec![FULL_BLOCK]);
    }

    #[test]
    fn cursor_is_restored() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(2, 0, 16));
        lcd.put_str("Load").unwrap();
        lcd.draw_bar(23).unwrap();
        assert_eq!(lcd.position(), Some(Position::new(1, 4)));
        assert_eq!(lcd.driver().address_counter(), 4);
        lcd.put_str("!").unwrap();
        assert_eq!(lcd.driver().ddram(4), b'!');
    }

    #[test]
    fn bar_draws_in_order_with_right_to_left_entry() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        lcd.set_mode(ENTRY_MODE_DEC_NO_SHIFT).unwrap();
        lcd.draw_bar(12).unwrap();
        assert_eq!(cells(&lcd), expected(2, true, 4));
    }

    #[test]
    fn redraw_restores_overwritten_cells() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        lcd.draw_bar(10).unwrap();
        lcd.home().unwrap();
        lcd.put_str("xx").unwrap();
        lcd.redraw_bar().unwrap();
        assert_eq!(cells(&lcd), expected(2, false, 4));
    }

    #[test]
    fn first_draw_overwrites_text_on_the_bar_line() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(2, 0, 16));
        lcd.goto(2, 0).unwrap();
        lcd.put_str("-42 007 3.14").unwrap();
        lcd.draw_bar(0).unwrap();
        lcd.draw_bar(3).unwrap();
        assert_eq!(
            lcd.driver().line_text(lcd.geometry(), 2).unwrap(),
            "5               "
        );
        assert_eq!(cells(&lcd), expected(0, true, 16));
    }

    #[test]
    fn draw_after_clear_rewrites_every_cell() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        lcd.draw_bar(20).unwrap();
        lcd.clear().unwrap();
        lcd.put_str("abcd").unwrap();
        lcd.driver_mut().take_transactions();
        lcd.draw_bar(0).unwrap();
        assert_eq!(cells(&lcd), expected(0, false, 4));
        let blanks = lcd
            .driver()
            .transactions()
            .iter()
            .filter(|t| **t == BusTransaction::Data(b' '))
            .count();
        assert_eq!(blanks, 4);
    }

    #[test]
    fn clear_resets_the_bar() {
        let mut lcd = bar_lcd(ProgressBarConfig::new(1, 0, 4));
        lcd.draw_bar(20).unwrap();
        lcd.clear().unwrap();
        assert_eq!(lcd.bar_level(), Some(0));
        lcd.draw_bar(5).unwrap();
        assert_eq!(cells(&lcd), expected(1, false, 4));
    }

    #[test]
    fn bar_needs_a_config() {
        let mut lcd = lcd_16x2();
        assert_eq!(lcd.draw_bar(1), Err(LcdError::ProgressBarDisabled));
        assert_eq!(lcd.bar_level(), None);
    }

    #[test]
    fn bar_must_fit_on_its_line() {
        let config = LcdConfig::default().with_progress_bar(ProgressBarConfig::new(1, 10, 8));
        assert!(matches!(
            Lcd::new(SimulatedHD44780::new(), config),
            Err(LcdError::ColumnOutOfRange { .. })
        ));
        let config = LcdConfig::default().with_progress_bar(ProgressBarConfig::new(3, 0, 8));
        assert!(matches!(
            Lcd::new(SimulatedHD44780::new(), config),
            Err(LcdError::InvalidLine(3))
        ));
    }
}
