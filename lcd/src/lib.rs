pub mod gpiod;
pub mod lcd;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A source of output lines for driving a parallel LCD bus.
///
/// The LCD is only ever written to (RW held low), so backends only need to hand out outputs.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the line at the given index as an output.
    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Claims the lines at the given indices as an output bus, LSb first.
    fn get_output_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the line based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO line.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO lines in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        let mut values = [false; 8];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO lines in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}
