use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::lcd::hd44780::{
    DisplayControl, DisplayGeometry, EntryMode, LcdConfig, LcdError, LcdResult, Mode, Position,
};
use log::{debug, warn};
use std::fmt;

/// Size of CGRAM in bytes, 8 glyphs of 8 rows.
pub const CGRAM_SIZE: u8 = 64;

/// Where the next data byte will be written.
///
/// DDRAM and CGRAM share one address counter in the controller, so moving into one leaves the
/// other; after writing glyphs the cursor has to be put back with [Lcd::goto].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RamPointer {
    /// A visible cell. The DDRAM address is always derived from it, see [Lcd::address].
    Ddram(Position),
    /// A raw CGRAM address, `slot * 8 + row`.
    Cgram(u8),
}

/// A character display on top of an [HD44780Driver].
///
/// Owns the bus and all state the controller keeps to itself: where the cursor is (as a
/// [Position], so it can never point at a cell the glass doesn't show), how far the display
/// has been scrolled, the entry mode and the progress bar level.
///
/// [Self::init] must be called once before anything else; other operations assume an
/// initialised controller and don't check for it.
///
/// Operations that send several bytes are not atomic. If the bus fails half way, the error is
/// returned and the display contents are whatever made it through.
#[derive(Debug)]
pub struct Lcd<D: HD44780Driver> {
    pub(super) driver: D,
    pub(super) config: LcdConfig,
    pub(super) pointer: RamPointer,
    pub(super) entry_mode: EntryMode,
    pub(super) display_control: DisplayControl,
    pub(super) scroll_offset: i16,
    /// Last level drawn, `None` until the bar is first drawn after init or a clear.
    pub(super) bar_level: Option<u16>,
}

impl<D: HD44780Driver> Lcd<D> {
    /// Wraps a driver. Nothing is sent until [Self::init].
    pub fn new(driver: D, config: LcdConfig) -> LcdResult<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            config,
            pointer: RamPointer::Ddram(Position::HOME),
            entry_mode: EntryMode::default(),
            display_control: DisplayControl::default(),
            scroll_offset: 0,
            bar_level: None,
        })
    }

    /// Power-on configuration: bus synchronisation and function set, left-to-right entry
    /// without shift, display on without cursor, then [Self::clear].
    pub fn init(&mut self) -> LcdResult<()> {
        self.driver.init(self.config.geometry.multiline())?;

        self.entry_mode = EntryMode::default();
        self.driver.send_command(self.entry_mode.to_command())?;
        self.display_control = DisplayControl::default();
        self.driver.send_command(self.display_control.to_command())?;

        self.clear()?;
        debug!("{:?} initialized", self.config.geometry);
        Ok(())
    }

    pub fn config(&self) -> &LcdConfig {
        &self.config
    }

    pub fn geometry(&self) -> &DisplayGeometry {
        &self.config.geometry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }

    pub fn pointer(&self) -> RamPointer {
        self.pointer
    }

    /// The cursor position, or `None` while the address counter is in CGRAM.
    pub fn position(&self) -> Option<Position> {
        match self.pointer {
            RamPointer::Ddram(position) => Some(position),
            RamPointer::Cgram(_) => None,
        }
    }

    /// The raw address the next data byte goes to, in DDRAM or CGRAM.
    pub fn address(&self) -> LcdResult<u8> {
        match self.pointer {
            RamPointer::Ddram(position) => self.config.geometry.position_address(position),
            RamPointer::Cgram(address) => Ok(address),
        }
    }

    /// Net number of [Self::scroll] steps since the last clear or home, positive to the right.
    pub fn scroll_offset(&self) -> i16 {
        self.scroll_offset
    }

    pub fn entry_mode(&self) -> EntryMode {
        self.entry_mode
    }

    pub fn display_control(&self) -> DisplayControl {
        self.display_control
    }

    /// Blanks all of DDRAM and returns the cursor and the display to the home position.
    ///
    /// The controller also switches to left-to-right entry; the tracked entry mode follows it.
    /// A configured progress bar is back at level 0 and is drawn in full the next time.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.driver.clear_display()?;
        self.pointer = RamPointer::Ddram(Position::HOME);
        self.scroll_offset = 0;
        self.entry_mode.direction = CursorDirection::Right;
        self.bar_level = None;
        Ok(())
    }

    /// Moves the cursor to line 1, column 0 without touching the contents.
    ///
    /// The controller undoes any display shift as part of this, so the scroll offset is reset.
    pub fn home(&mut self) -> LcdResult<()> {
        self.driver.return_home()?;
        self.pointer = RamPointer::Ddram(Position::HOME);
        self.scroll_offset = 0;
        Ok(())
    }

    /// Applies an entry mode or display control given as its raw command byte, one of the
    /// `ENTRY_MODE_*` or `VIEW_MODE_*` constants.
    pub fn set_mode(&mut self, param: u8) -> LcdResult<()> {
        let mode = Mode::try_from(param)?;
        self.apply_mode(mode)
    }

    pub fn apply_mode(&mut self, mode: impl Into<Mode>) -> LcdResult<()> {
        let mode = mode.into();
        self.driver.send_command(mode.to_command())?;
        match mode {
            Mode::Entry(entry) => self.entry_mode = entry,
            Mode::Display(display) => self.display_control = display,
        }
        debug!("Mode set to {:?}", mode);
        Ok(())
    }

    /// Moves the cursor to a visible DDRAM cell.
    pub fn goto(&mut self, line: u8, column: u8) -> LcdResult<()> {
        let address = self.config.geometry.to_address(line, column)?;
        self.driver.set_ddram_address(address)?;
        self.pointer = RamPointer::Ddram(Position::new(line, column));
        Ok(())
    }

    /// Moves the address counter into CGRAM, to write glyph rows with [Self::put_char].
    pub fn goto_cgram(&mut self, address: u8) -> LcdResult<()> {
        if address >= CGRAM_SIZE {
            return Err(LcdError::InvalidSlot(address / 8));
        }
        self.driver.set_cgram_address(address)?;
        self.pointer = RamPointer::Cgram(address);
        Ok(())
    }

    /// Writes one byte at the cursor and advances it in the entry direction.
    ///
    /// In DDRAM, running off the end of a line continues at the start of the next line, and
    /// the last line continues on the first. Going right to left does the same backwards.
    pub fn put_char(&mut self, code: u8) -> LcdResult<()> {
        self.driver.send_data(code)?;
        let direction = self.entry_mode.direction;
        match self.pointer {
            RamPointer::Ddram(position) => self.follow(position, direction)?,
            RamPointer::Cgram(address) => {
                self.pointer = RamPointer::Cgram(Self::step_cgram(address, direction));
            }
        }
        Ok(())
    }

    /// Writes a string through [Self::put_char].
    ///
    /// With formatted output enabled, `\n` moves to the start of the next line, `\r` to the
    /// start of the current one and `\t` to the next tab stop. Characters outside ASCII are
    /// shown as `?`.
    pub fn put_str(&mut self, s: &str) -> LcdResult<()> {
        for c in s.chars() {
            if self.config.formatted_output && self.control_char(c)? {
                continue;
            }
            if c.is_ascii() {
                self.put_char(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.put_char(b'?')?;
            }
        }
        Ok(())
    }

    /// Erases the cell left of the cursor and leaves the cursor there.
    ///
    /// Only valid for left-to-right entry, fails with [LcdError::InvalidMode] otherwise. At
    /// line 1, column 0 there is nothing to erase and nothing is sent; at the start of any
    /// other line the last cell of the line above is erased.
    pub fn backspace(&mut self) -> LcdResult<()> {
        if self.entry_mode.direction != CursorDirection::Right {
            return Err(LcdError::InvalidMode(self.entry_mode.to_command()));
        }
        let RamPointer::Ddram(position) = self.pointer else {
            debug!("Backspace ignored in CGRAM");
            return Ok(());
        };
        if position == Position::HOME {
            return Ok(());
        }

        let previous = self.config.geometry.step(position, CursorDirection::Left);
        let address = self.config.geometry.position_address(previous)?;
        self.driver.set_ddram_address(address)?;
        self.driver.send_data(b' ')?;
        self.driver.set_ddram_address(address)?;
        self.pointer = RamPointer::Ddram(previous);
        Ok(())
    }

    /// Shifts the whole display one cell, without moving the cursor relative to the text.
    ///
    /// The controller wraps its window around DDRAM by itself; the offset wraps to 0 after a
    /// full bank.
    pub fn scroll(&mut self, direction: CursorDirection) -> LcdResult<()> {
        self.driver.cursor_shift(true, direction)?;
        let bank_length = self.config.geometry.bank_length() as i16;
        self.scroll_offset = (self.scroll_offset + direction.step()) % bank_length;
        debug!("Scroll offset {}", self.scroll_offset);
        Ok(())
    }

    /// Moves the cursor one cell without writing.
    pub fn cursor_shift(&mut self, direction: CursorDirection) -> LcdResult<()> {
        self.driver.cursor_shift(false, direction)?;
        match self.pointer {
            RamPointer::Ddram(position) => self.follow(position, direction)?,
            RamPointer::Cgram(address) => {
                self.pointer = RamPointer::Cgram(Self::step_cgram(address, direction));
            }
        }
        Ok(())
    }

    /// Tracks the controller's own one-step address move from `position`.
    ///
    /// The counter's new address is mapped back with [DisplayGeometry::to_logical]. When it
    /// lands on a hidden cell, or on a line other than the next one in order, the counter is
    /// re-addressed to the next cell.
    fn follow(&mut self, position: Position, direction: CursorDirection) -> LcdResult<()> {
        let geometry = self.config.geometry;
        let address = geometry.next_address(geometry.position_address(position)?, direction);
        let next = geometry.step(position, direction);
        if geometry.to_logical(address) != Some(next) {
            self.driver.set_ddram_address(geometry.position_address(next)?)?;
        }
        self.pointer = RamPointer::Ddram(next);
        Ok(())
    }

    fn step_cgram(address: u8, direction: CursorDirection) -> u8 {
        (address as i16 + direction.step()).rem_euclid(CGRAM_SIZE as i16) as u8
    }

    /// Handles a formatting character. Returns `false` if `c` should be printed instead.
    fn control_char(&mut self, c: char) -> LcdResult<bool> {
        let RamPointer::Ddram(position) = self.pointer else {
            return Ok(false);
        };
        let geometry = self.config.geometry;
        let target = match c {
            '\n' => Position::new(geometry.next_line(position.line), 0),
            '\r' => Position::new(position.line, 0),
            '\t' => {
                let tab_width = self.config.tab_width;
                let stop = (position.column / tab_width + 1) as u16 * tab_width as u16;
                if stop < geometry.columns() as u16 {
                    Position::new(position.line, stop as u8)
                } else {
                    Position::new(geometry.next_line(position.line), 0)
                }
            }
            _ => return Ok(false),
        };
        self.goto(target.line, target.column)?;
        Ok(true)
    }
}

impl<D: HD44780Driver> fmt::Write for Lcd<D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::{BusTransaction, SimulatedHD44780};
    use crate::lcd::hd44780::{
        ENTRY_MODE_DEC_NO_SHIFT, ENTRY_MODE_INC_WITH_SHIFT, VIEW_MODE_DISP_ON_BLK_ON_CRS_ON,
    };
    use std::fmt::Write;

    /// An initialised display on a simulated controller, with the init traffic dropped.
    pub fn lcd(config: LcdConfig) -> Lcd<SimulatedHD44780> {
        let mut lcd = Lcd::new(SimulatedHD44780::new(), config).unwrap();
        lcd.init().unwrap();
        lcd.driver_mut().take_transactions();
        lcd
    }

    pub fn lcd_16x2() -> Lcd<SimulatedHD44780> {
        lcd(LcdConfig::default())
    }

    fn line(lcd: &Lcd<SimulatedHD44780>, line: u8) -> String {
        lcd.driver().line_text(lcd.geometry(), line).unwrap()
    }

    #[test]
    fn init_sends_the_power_on_sequence() {
        let mut lcd = Lcd::new(SimulatedHD44780::new(), LcdConfig::default()).unwrap();
        lcd.init().unwrap();
        assert_eq!(
            lcd.driver().transactions(),
            &[
                BusTransaction::Command(0x38),
                BusTransaction::Command(0x06),
                BusTransaction::Command(0x0C),
                BusTransaction::Command(0x01),
            ]
        );
        assert!(lcd.driver().is_two_lines());
    }

    #[test]
    fn clear_blanks_everything_and_homes() {
        let mut lcd = lcd_16x2();
        lcd.put_str("hello\nworld").unwrap();
        lcd.scroll(CursorDirection::Left).unwrap();
        lcd.clear().unwrap();

        for address in (0x00..0x28).chain(0x40..0x68) {
            assert_eq!(lcd.driver().ddram(address), b' ');
        }
        assert_eq!(lcd.position(), Some(Position::HOME));
        assert_eq!(lcd.scroll_offset(), 0);
        assert_eq!(lcd.driver().address_counter(), 0);
    }

    #[test]
    fn home_keeps_contents() {
        let mut lcd = lcd_16x2();
        lcd.put_str("abc").unwrap();
        lcd.scroll(CursorDirection::Right).unwrap();
        lcd.home().unwrap();
        assert_eq!(&line(&lcd, 1)[..3], "abc");
        assert_eq!(lcd.position(), Some(Position::HOME));
        assert_eq!(lcd.scroll_offset(), 0);
        assert_eq!(lcd.driver().display_shift(), 0);
    }

    #[test]
    fn empty_string_changes_nothing() {
        let mut lcd = lcd_16x2();
        lcd.goto(2, 5).unwrap();
        lcd.driver_mut().take_transactions();
        lcd.put_str("").unwrap();
        assert_eq!(lcd.position(), Some(Position::new(2, 5)));
        assert!(lcd.driver().transactions().is_empty());
    }

    #[test]
    fn seventeenth_char_lands_on_line_two() {
        let mut lcd = lcd_16x2();
        lcd.put_str("ABCDEFGHIJKLMNOPQ").unwrap();
        assert_eq!(line(&lcd, 1), "ABCDEFGHIJKLMNOP");
        assert_eq!(&line(&lcd, 2)[..1], "Q");
        assert_eq!(lcd.position(), Some(Position::new(2, 1)));
        assert_eq!(lcd.driver().address_counter(), 0x41);
    }

    #[test]
    fn last_line_wraps_to_first() {
        let mut lcd = lcd_16x2();
        lcd.goto(2, 15).unwrap();
        lcd.put_str("xy").unwrap();
        assert_eq!(lcd.driver().ddram(0x4F), b'x');
        assert_eq!(lcd.driver().ddram(0x00), b'y');
        assert_eq!(lcd.position(), Some(Position::new(1, 1)));
    }

    #[test]
    fn four_line_wrap_follows_physical_lines() {
        let mut lcd = lcd(LcdConfig::new(DisplayGeometry::new(4, 20).unwrap()));
        lcd.goto(2, 19).unwrap();
        lcd.put_str("ab").unwrap();
        assert_eq!(lcd.driver().ddram(0x53), b'a');
        assert_eq!(lcd.driver().ddram(0x14), b'b');
        assert_eq!(lcd.position(), Some(Position::new(3, 1)));
    }

    #[test]
    fn decrement_mode_writes_backwards_across_lines() {
        let mut lcd = lcd_16x2();
        lcd.set_mode(ENTRY_MODE_DEC_NO_SHIFT).unwrap();
        lcd.goto(2, 0).unwrap();
        lcd.put_str("ab").unwrap();
        assert_eq!(lcd.driver().ddram(0x40), b'a');
        assert_eq!(lcd.driver().ddram(0x0F), b'b');
        assert_eq!(lcd.position(), Some(Position::new(1, 14)));
        assert_eq!(lcd.driver().address_counter(), 0x0E);
    }

    #[test]
    fn formatted_output_moves_the_cursor() {
        let mut lcd = lcd_16x2();
        lcd.put_str("ab\tc\nd\re").unwrap();
        assert_eq!(&line(&lcd, 1)[..5], "ab  c");
        assert_eq!(&line(&lcd, 2)[..1], "e");
        assert_eq!(lcd.position(), Some(Position::new(2, 1)));
    }

    #[test]
    fn tab_past_the_last_stop_goes_to_next_line() {
        let mut lcd = lcd_16x2();
        lcd.goto(1, 13).unwrap();
        lcd.put_str("\t").unwrap();
        assert_eq!(lcd.position(), Some(Position::new(2, 0)));
    }

    #[test]
    fn unformatted_output_prints_control_bytes() {
        let mut lcd = lcd(LcdConfig::default().with_formatted_output(false));
        lcd.put_str("a\nb").unwrap();
        assert_eq!(lcd.driver().ddram(1), b'\n');
        assert_eq!(lcd.position(), Some(Position::new(1, 3)));
    }

    #[test]
    fn non_ascii_becomes_question_mark() {
        let mut lcd = lcd_16x2();
        lcd.put_str("é").unwrap();
        assert_eq!(lcd.driver().ddram(0), b'?');
    }

    #[test]
    fn backspace_erases_left_cell() {
        let mut lcd = lcd_16x2();
        lcd.put_str("abc").unwrap();
        lcd.backspace().unwrap();
        assert_eq!(&line(&lcd, 1)[..3], "ab ");
        assert_eq!(lcd.position(), Some(Position::new(1, 2)));
        assert_eq!(lcd.driver().address_counter(), 2);
    }

    #[test]
    fn backspace_at_origin_is_a_no_op() {
        let mut lcd = lcd_16x2();
        lcd.backspace().unwrap();
        assert!(lcd.driver().transactions().is_empty());
        assert_eq!(lcd.position(), Some(Position::HOME));
    }

    #[test]
    fn backspace_at_line_start_erases_line_above() {
        let mut lcd = lcd_16x2();
        lcd.put_str("0123456789ABCDEF").unwrap();
        assert_eq!(lcd.position(), Some(Position::new(2, 0)));
        lcd.backspace().unwrap();
        assert_eq!(lcd.driver().ddram(0x0F), b' ');
        assert_eq!(lcd.position(), Some(Position::new(1, 15)));
    }

    #[test]
    fn backspace_needs_left_to_right_entry() {
        let mut lcd = lcd_16x2();
        lcd.put_str("ab").unwrap();
        lcd.set_mode(ENTRY_MODE_DEC_NO_SHIFT).unwrap();
        lcd.driver_mut().take_transactions();
        assert_eq!(
            lcd.backspace(),
            Err(LcdError::InvalidMode(ENTRY_MODE_DEC_NO_SHIFT))
        );
        assert!(lcd.driver().transactions().is_empty());
    }

    #[test]
    fn scroll_counts_and_shifts() {
        let mut lcd = lcd_16x2();
        lcd.scroll(CursorDirection::Left).unwrap();
        lcd.scroll(CursorDirection::Left).unwrap();
        lcd.scroll(CursorDirection::Right).unwrap();
        assert_eq!(lcd.scroll_offset(), -1);
        assert_eq!(lcd.driver().display_shift(), -1);
        assert_eq!(
            lcd.driver().transactions(),
            &[
                BusTransaction::Command(0x18),
                BusTransaction::Command(0x18),
                BusTransaction::Command(0x1C),
            ]
        );
    }

    #[test]
    fn scroll_offset_wraps_after_a_full_bank() {
        let mut lcd = lcd_16x2();
        for _ in 0..40 {
            lcd.scroll(CursorDirection::Right).unwrap();
        }
        assert_eq!(lcd.scroll_offset(), 0);
    }

    #[test]
    fn cursor_shift_resyncs_across_lines() {
        let mut lcd = lcd_16x2();
        lcd.goto(1, 15).unwrap();
        lcd.cursor_shift(CursorDirection::Right).unwrap();
        assert_eq!(lcd.position(), Some(Position::new(2, 0)));
        assert_eq!(lcd.driver().address_counter(), 0x40);
        lcd.cursor_shift(CursorDirection::Left).unwrap();
        assert_eq!(lcd.position(), Some(Position::new(1, 15)));
        assert_eq!(lcd.driver().address_counter(), 0x0F);
        lcd.driver_mut().take_transactions();
        lcd.cursor_shift(CursorDirection::Left).unwrap();
        assert_eq!(lcd.driver().transactions(), &[BusTransaction::Command(0x10)]);
        assert_eq!(lcd.address(), Ok(0x0E));
    }

    #[test]
    fn cursor_shift_keeps_the_controller_address_when_it_stays_visible() {
        let mut lcd = lcd(LcdConfig::new(DisplayGeometry::new(2, 40).unwrap()));
        lcd.goto(1, 39).unwrap();
        lcd.driver_mut().take_transactions();
        lcd.cursor_shift(CursorDirection::Right).unwrap();
        assert_eq!(lcd.driver().transactions(), &[BusTransaction::Command(0x14)]);
        assert_eq!(lcd.position(), Some(Position::new(2, 0)));
        assert_eq!(lcd.driver().address_counter(), 0x40);
    }

    #[test]
    fn cursor_shift_reorders_four_line_wrap() {
        let mut lcd = lcd(LcdConfig::new(DisplayGeometry::new(4, 20).unwrap()));
        lcd.goto(1, 19).unwrap();
        lcd.cursor_shift(CursorDirection::Right).unwrap();
        assert_eq!(lcd.position(), Some(Position::new(2, 0)));
        assert_eq!(lcd.driver().address_counter(), 0x40);
    }

    #[test]
    fn set_mode_rejects_unknown_patterns_without_bus_traffic() {
        let mut lcd = lcd_16x2();
        assert_eq!(lcd.set_mode(0x09), Err(LcdError::InvalidMode(0x09)));
        assert!(lcd.driver().transactions().is_empty());
    }

    #[test]
    fn set_mode_updates_tracked_state() {
        let mut lcd = lcd_16x2();
        lcd.set_mode(VIEW_MODE_DISP_ON_BLK_ON_CRS_ON).unwrap();
        lcd.set_mode(ENTRY_MODE_INC_WITH_SHIFT).unwrap();
        assert_eq!(
            lcd.display_control(),
            DisplayControl {
                display_on: true,
                cursor_on: true,
                blink_on: true
            }
        );
        assert!(lcd.entry_mode().shift_display);
        assert_eq!(lcd.driver().display_control(), (true, true, true));
    }

    #[test]
    fn goto_validates_before_sending() {
        let mut lcd = lcd_16x2();
        assert_eq!(lcd.goto(3, 0), Err(LcdError::InvalidLine(3)));
        assert_eq!(
            lcd.goto(1, 16),
            Err(LcdError::ColumnOutOfRange {
                column: 16,
                columns: 16
            })
        );
        assert!(lcd.driver().transactions().is_empty());
    }

    #[test]
    fn put_char_in_cgram_writes_rows() {
        let mut lcd = lcd_16x2();
        lcd.goto_cgram(8).unwrap();
        lcd.put_char(0b10101).unwrap();
        assert_eq!(lcd.driver().cgram(8), 0b10101);
        assert_eq!(lcd.pointer(), RamPointer::Cgram(9));
        assert_eq!(lcd.position(), None);
        assert_eq!(lcd.goto_cgram(64), Err(LcdError::InvalidSlot(8)));
    }

    #[test]
    fn fmt_write_goes_through_the_string_path() {
        let mut lcd = lcd_16x2();
        write!(lcd, "{}:{:02}", 7, 5).unwrap();
        assert_eq!(&line(&lcd, 1)[..4], "7:05");
    }

    #[test]
    fn bus_faults_are_surfaced() {
        let mut lcd = lcd_16x2();
        lcd.driver_mut().fail_after(2);
        let result = lcd.put_str("abc");
        assert!(matches!(result, Err(LcdError::BusFault(_))));
        assert_eq!(&line(&lcd, 1)[..3], "ab ");
    }
}
