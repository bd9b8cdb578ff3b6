use crate::lcd::hd44780::driver::CursorDirection;
use crate::lcd::hd44780::{LcdError, LcdResult};

/// Number of the top line. Lines are counted from 1, columns from 0.
pub const FIRST_LINE: u8 = 1;
/// The controller drives at most four lines.
pub const MAX_LINES: u8 = 4;
pub const START_ADDRESS_1ST_LINE: u8 = 0x00;
pub const START_ADDRESS_2ND_LINE: u8 = 0x40;

/// DDRAM cells per line in one-line mode.
const ONE_LINE_BANK: u8 = 80;
/// DDRAM cells per bank in two-line mode. Lines 3 and 4 continue lines 1 and 2.
const TWO_LINE_BANK: u8 = 40;

/// A logical screen position.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Position {
    /// `1..=lines`
    pub line: u8,
    /// `0..columns`
    pub column: u8,
}

impl Position {
    pub const HOME: Position = Position {
        line: FIRST_LINE,
        column: 0,
    };

    pub fn new(line: u8, column: u8) -> Self {
        Self { line, column }
    }
}

/// Shape of the glass and where each of its lines starts in DDRAM.
///
/// Lines 1 and 2 start at the two DDRAM banks (`0x00`, `0x40`); lines 3 and 4 are the
/// continuation of those banks, one line width further in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DisplayGeometry {
    lines: u8,
    columns: u8,
    starts: [u8; MAX_LINES as usize],
}

impl DisplayGeometry {
    pub fn new(lines: u8, columns: u8) -> LcdResult<Self> {
        let max_columns = match lines {
            1 => ONE_LINE_BANK,
            2 => TWO_LINE_BANK,
            3 | 4 => TWO_LINE_BANK / 2,
            _ => return Err(LcdError::InvalidGeometry { lines, columns }),
        };
        if columns == 0 || columns > max_columns {
            return Err(LcdError::InvalidGeometry { lines, columns });
        }

        Ok(Self {
            lines,
            columns,
            starts: [
                START_ADDRESS_1ST_LINE,
                START_ADDRESS_2ND_LINE,
                START_ADDRESS_1ST_LINE + columns,
                START_ADDRESS_2ND_LINE + columns,
            ],
        })
    }

    pub fn lines(&self) -> u8 {
        self.lines
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    /// Whether the controller has to run in two-line mode.
    pub fn multiline(&self) -> bool {
        self.lines > 1
    }

    /// Length of a DDRAM bank; the display shift wraps after this many steps.
    pub fn bank_length(&self) -> u8 {
        if self.multiline() {
            TWO_LINE_BANK
        } else {
            ONE_LINE_BANK
        }
    }

    pub fn line_start(&self, line: u8) -> LcdResult<u8> {
        if !(FIRST_LINE..=self.lines).contains(&line) {
            return Err(LcdError::InvalidLine(line));
        }
        Ok(self.starts[(line - FIRST_LINE) as usize])
    }

    pub fn to_address(&self, line: u8, column: u8) -> LcdResult<u8> {
        let start = self.line_start(line)?;
        if column >= self.columns {
            return Err(LcdError::ColumnOutOfRange {
                column,
                columns: self.columns,
            });
        }
        Ok(start + column)
    }

    pub fn position_address(&self, position: Position) -> LcdResult<u8> {
        self.to_address(position.line, position.column)
    }

    /// Finds the visible cell a DDRAM address belongs to.
    ///
    /// Returns `None` for addresses the controller has but the glass does not show.
    pub fn to_logical(&self, address: u8) -> Option<Position> {
        (FIRST_LINE..=self.lines).find_map(|line| {
            let start = self.starts[(line - FIRST_LINE) as usize];
            (start..start + self.columns)
                .contains(&address)
                .then(|| Position::new(line, address - start))
        })
    }

    /// Where the controller's address counter goes from `address` after one step, wrapping
    /// inside its DDRAM bank: `0x27` to `0x40` and `0x67` to `0x00` with two banks, `0x4F` to
    /// `0x00` with one.
    pub fn next_address(&self, address: u8, direction: CursorDirection) -> u8 {
        let bank_length = self.bank_length() as i16;
        if !self.multiline() {
            return (address as i16 + direction.step()).rem_euclid(bank_length) as u8;
        }
        let bank = address & START_ADDRESS_2ND_LINE;
        let other = bank ^ START_ADDRESS_2ND_LINE;
        match (address - bank) as i16 + direction.step() {
            -1 => other + bank_length as u8 - 1,
            offset if offset == bank_length => other,
            offset => bank + offset as u8,
        }
    }

    /// The cell after `position` in the given direction.
    ///
    /// Runs off the end of a line onto the start of the next one, and from the last line back
    /// to the first. Going left does the same in reverse.
    pub fn step(&self, position: Position, direction: CursorDirection) -> Position {
        match direction {
            CursorDirection::Right if position.column + 1 < self.columns => {
                Position::new(position.line, position.column + 1)
            }
            CursorDirection::Right => Position::new(self.next_line(position.line), 0),
            CursorDirection::Left if position.column > 0 => {
                Position::new(position.line, position.column - 1)
            }
            CursorDirection::Left => Position::new(self.previous_line(position.line), self.columns - 1),
        }
    }

    pub fn next_line(&self, line: u8) -> u8 {
        if line >= self.lines {
            FIRST_LINE
        } else {
            line + 1
        }
    }

    pub fn previous_line(&self, line: u8) -> u8 {
        if line <= FIRST_LINE {
            self.lines
        } else {
            line - 1
        }
    }
}

impl Default for DisplayGeometry {
    /// The common 16x2 module.
    fn default() -> Self {
        Self {
            lines: 2,
            columns: 16,
            starts: [
                START_ADDRESS_1ST_LINE,
                START_ADDRESS_2ND_LINE,
                START_ADDRESS_1ST_LINE + 16,
                START_ADDRESS_2ND_LINE + 16,
            ],
        }
    }
}
