use crate::lcd::hd44780::DisplayGeometry;
use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver};
use crate::{GpioError, GpioResult};
use log::trace;

const DDRAM_SIZE: usize = 0x80;
const CGRAM_SIZE: usize = 0x40;
const SECOND_BANK: u8 = 0x40;
const BANK_LENGTH_TWO_LINES: u8 = 40;
const BANK_LENGTH_ONE_LINE: u8 = 80;

/// One byte as it went over the bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusTransaction {
    /// RS low.
    Command(u8),
    /// RS high.
    Data(u8),
}

/// Which memory the address counter currently points into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RamKind {
    Ddram,
    Cgram,
}

/// A software HD44780.
///
/// Decodes every command the way the controller does and keeps DDRAM, CGRAM, the address
/// counter and the display shift, so the display layer can be checked without hardware. Every
/// byte is also recorded as a [BusTransaction].
#[derive(Debug, Clone)]
pub struct SimulatedHD44780 {
    ddram: [u8; DDRAM_SIZE],
    cgram: [u8; CGRAM_SIZE],
    address_counter: u8,
    ram: RamKind,
    increment: bool,
    shift_on_write: bool,
    display_shift: i16,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    two_lines: bool,
    transactions: Vec<BusTransaction>,
    fail_after: Option<usize>,
}

impl Default for SimulatedHD44780 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHD44780 {
    pub fn new() -> Self {
        Self {
            ddram: [b' '; DDRAM_SIZE],
            cgram: [0; CGRAM_SIZE],
            address_counter: 0,
            ram: RamKind::Ddram,
            increment: true,
            shift_on_write: false,
            display_shift: 0,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            two_lines: false,
            transactions: Vec::new(),
            fail_after: None,
        }
    }

    /// Makes every transfer after the next `transfers` ones fail, like a disconnected bus.
    pub fn fail_after(&mut self, transfers: usize) {
        self.fail_after = Some(self.transactions.len() + transfers);
    }

    /// All transfers since creation or the last [Self::take_transactions].
    pub fn transactions(&self) -> &[BusTransaction] {
        &self.transactions
    }

    pub fn take_transactions(&mut self) -> Vec<BusTransaction> {
        std::mem::take(&mut self.transactions)
    }

    pub fn ddram(&self, address: u8) -> u8 {
        self.ddram[address as usize % DDRAM_SIZE]
    }

    pub fn cgram(&self, address: u8) -> u8 {
        self.cgram[address as usize % CGRAM_SIZE]
    }

    /// The 8 rows stored for a custom character slot.
    pub fn glyph(&self, slot: u8) -> [u8; 8] {
        let start = (slot as usize % 8) * 8;
        let mut rows = [0; 8];
        rows.copy_from_slice(&self.cgram[start..start + 8]);
        rows
    }

    pub fn address_counter(&self) -> u8 {
        self.address_counter
    }

    pub fn ram(&self) -> RamKind {
        self.ram
    }

    /// Net number of display shifts, positive to the right.
    pub fn display_shift(&self) -> i16 {
        self.display_shift
    }

    pub fn entry_mode(&self) -> (CursorDirection, bool) {
        let direction = if self.increment {
            CursorDirection::Right
        } else {
            CursorDirection::Left
        };
        (direction, self.shift_on_write)
    }

    /// Display, cursor and blink flags.
    pub fn display_control(&self) -> (bool, bool, bool) {
        (self.display_on, self.cursor_on, self.blink_on)
    }

    pub fn is_two_lines(&self) -> bool {
        self.two_lines
    }

    /// DDRAM contents of one logical line, ignoring the display shift.
    pub fn line_text(&self, geometry: &DisplayGeometry, line: u8) -> GpioResult<String> {
        let start = geometry
            .line_start(line)
            .map_err(|err| GpioError::Other(err.to_string()))?;
        Ok((0..geometry.columns())
            .map(|column| Self::printable(self.ddram(start + column)))
            .collect())
    }

    /// What the glass shows, line by line, with the display shift applied.
    pub fn screen(&self, geometry: &DisplayGeometry) -> Vec<String> {
        let bank_length = self.bank_length() as i16;
        (1..=geometry.lines())
            .filter_map(|line| geometry.line_start(line).ok())
            .map(|start| {
                let bank = start & SECOND_BANK;
                (0..geometry.columns())
                    .map(|column| {
                        let offset = ((start - bank) as i16 + column as i16 - self.display_shift)
                            .rem_euclid(bank_length);
                        Self::printable(self.ddram(bank + offset as u8))
                    })
                    .collect()
            })
            .collect()
    }

    fn printable(code: u8) -> char {
        match code {
            0x00..=0x07 => char::from(b'0' + code),
            0x20..=0x7E => char::from(code),
            0xFF => '#',
            _ => '?',
        }
    }

    fn bank_length(&self) -> u8 {
        if self.two_lines {
            BANK_LENGTH_TWO_LINES
        } else {
            BANK_LENGTH_ONE_LINE
        }
    }

    fn step_address(&mut self, increment: bool) {
        self.address_counter = match self.ram {
            RamKind::Cgram => {
                if increment {
                    (self.address_counter + 1) % CGRAM_SIZE as u8
                } else {
                    (self.address_counter + CGRAM_SIZE as u8 - 1) % CGRAM_SIZE as u8
                }
            }
            RamKind::Ddram => {
                let bank = if self.two_lines {
                    self.address_counter & SECOND_BANK
                } else {
                    0
                };
                let last = bank + self.bank_length() - 1;
                match (increment, self.two_lines) {
                    (true, _) if self.address_counter < last => self.address_counter + 1,
                    (true, true) => bank ^ SECOND_BANK,
                    (true, false) => 0,
                    (false, _) if self.address_counter > bank => self.address_counter - 1,
                    (false, true) => (bank ^ SECOND_BANK) + BANK_LENGTH_TWO_LINES - 1,
                    (false, false) => BANK_LENGTH_ONE_LINE - 1,
                }
            }
        };
    }

    fn shift_display(&mut self, right: bool) {
        let bank_length = self.bank_length() as i16;
        let step = if right { 1 } else { -1 };
        self.display_shift = (self.display_shift + step) % bank_length;
    }

    fn record(&mut self, transaction: BusTransaction) -> GpioResult<()> {
        if self.fail_after.is_some_and(|limit| self.transactions.len() >= limit) {
            return Err(GpioError::Other("simulated bus fault".into()));
        }
        trace!("Simulated {:?}", transaction);
        self.transactions.push(transaction);
        Ok(())
    }

    fn execute(&mut self, command: u8) {
        match command {
            0b1000_0000..=0xFF => {
                self.ram = RamKind::Ddram;
                self.address_counter = command & 0b0111_1111;
            }
            0b0100_0000..=0b0111_1111 => {
                self.ram = RamKind::Cgram;
                self.address_counter = command & 0b0011_1111;
            }
            0b0010_0000..=0b0011_1111 => {
                self.two_lines = command & 0b0000_1000 != 0;
            }
            0b0001_0000..=0b0001_1111 => {
                let right = command & 0b0000_0100 != 0;
                if command & 0b0000_1000 != 0 {
                    self.shift_display(right);
                } else {
                    self.step_address(right);
                }
            }
            0b0000_1000..=0b0000_1111 => {
                self.display_on = command & 0b100 != 0;
                self.cursor_on = command & 0b010 != 0;
                self.blink_on = command & 0b001 != 0;
            }
            0b0000_0100..=0b0000_0111 => {
                self.increment = command & 0b10 != 0;
                self.shift_on_write = command & 0b01 != 0;
            }
            0b0000_0010..=0b0000_0011 => {
                self.ram = RamKind::Ddram;
                self.address_counter = 0;
                self.display_shift = 0;
            }
            0b0000_0001 => {
                self.ddram = [b' '; DDRAM_SIZE];
                self.ram = RamKind::Ddram;
                self.address_counter = 0;
                self.display_shift = 0;
                self.increment = true;
            }
            0 => {}
        }
    }
}

impl HD44780Driver for SimulatedHD44780 {
    fn init(&mut self, multiline: bool) -> GpioResult<()> {
        self.function_set(true, multiline, false)
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.record(BusTransaction::Command(command))?;
        self.execute(command);
        Ok(())
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.record(BusTransaction::Data(data))?;
        match self.ram {
            RamKind::Ddram => self.ddram[self.address_counter as usize] = data,
            RamKind::Cgram => self.cgram[self.address_counter as usize] = data,
        }
        self.step_address(self.increment);
        if self.shift_on_write && self.ram == RamKind::Ddram {
            // I/D = 1 with S = 1 moves the text left under a fixed cursor
            self.shift_display(!self.increment);
        }
        Ok(())
    }
}
