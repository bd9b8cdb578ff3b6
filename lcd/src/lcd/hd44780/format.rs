use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::{Lcd, LcdResult};
use std::iter;

/// Signed decimal, `-` for negative values, no padding.
pub fn int_to_string(value: i32) -> String {
    value.to_string()
}

/// Unsigned decimal, zero-padded to at least `digits` characters. Longer numbers are never cut.
pub fn uint_to_string_fixed_width(value: u32, digits: u8) -> String {
    format!("{:0width$}", value, width = digits as usize)
}

/// Fixed-point decimal with exactly `precision` fractional digits.
///
/// Rounds half away from zero, applied to the shortest decimal form of the value, so `2.675`
/// with two digits gives `2.68` even though the nearest `f32` is slightly below it. A result
/// that rounds to zero has no sign. With `precision` 0 there is no decimal point. NaN and
/// infinities come out as `NaN`, `inf` and `-inf`.
pub fn float_to_string(value: f32, precision: u8) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // Display for floats never switches to exponent notation
    let shortest = value.abs().to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((&shortest, ""));
    let precision = precision as usize;

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(iter::repeat(b'0')).take(precision))
        .map(|b| b - b'0')
        .collect();

    if frac_part.as_bytes().get(precision).is_some_and(|&d| d >= b'5') {
        round_up(&mut digits);
    }

    let int_len = digits.len() - precision;
    let negative = value.is_sign_negative() && digits.iter().any(|&d| d != 0);

    let mut out = String::with_capacity(digits.len() + 2);
    if negative {
        out.push('-');
    }
    out.extend(digits[..int_len].iter().map(|&d| char::from(b'0' + d)));
    if precision > 0 {
        out.push('.');
        out.extend(digits[int_len..].iter().map(|&d| char::from(b'0' + d)));
    }
    out
}

/// Adds one to the last digit, carrying to the left.
fn round_up(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, 1);
}

impl<D: HD44780Driver> Lcd<D> {
    /// Prints [int_to_string] at the cursor.
    pub fn put_int(&mut self, value: i32) -> LcdResult<()> {
        self.put_str(&int_to_string(value))
    }

    /// Prints [uint_to_string_fixed_width] at the cursor.
    pub fn put_uint_fixed(&mut self, value: u32, digits: u8) -> LcdResult<()> {
        self.put_str(&uint_to_string_fixed_width(value, digits))
    }

    /// Prints [float_to_string] at the cursor.
    pub fn put_float(&mut self, value: f32, precision: u8) -> LcdResult<()> {
        self.put_str(&float_to_string(value, precision))
    }
}
