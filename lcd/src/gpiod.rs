//! Linux GPIO character device backend, using the gpiod library.
//!
//! Hands out output lines and output buses for the [parallel LCD bus](crate::lcd::hd44780::driver::GpioHD44780Driver).
use crate::{GpioActiveLevel, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult};
use bitvec::vec::BitVec;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to claim output lines of one chip.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_lines: BitVec<AtomicU8>,
    active_level: GpioActiveLevel,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            used_lines: BitVec::repeat(false, n),
            active_level: GpioActiveLevel::High,
        }
    }

    /// Opens the chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }

    /// Sets the active level used for every line claimed afterwards.
    pub fn with_active_level(mut self, level: GpioActiveLevel) -> Self {
        self.active_level = level;
        self
    }

    fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_lines[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in indices {
            self.used_lines.set_aliased(index, true);
        }
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            self.used_lines.set_aliased(index, false);
        }
    }

    fn request(&self, indices: &[usize]) -> GpioResult<gpiod::Lines<gpiod::Output>> {
        let lines = self.chip.request_lines(
            gpiod::Options::output(indices.iter().map(|&index| index as u32).collect::<Vec<_>>())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into()),
        )?;
        Ok(lines)
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.claim(&[index])?;
        match self.request(&[index]) {
            Ok(line) => Ok(Box::new(GpiodOutput {
                driver: self,
                index,
                line,
            })),
            Err(err) => {
                self.release(&[index]);
                Err(err)
            }
        }
    }

    fn get_output_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        self.claim(&indices)?;
        match self.request(&indices) {
            Ok(line) => Ok(Box::new(GpiodBusOutput {
                driver: self,
                indices,
                line,
            })),
            Err(err) => {
                self.release(&indices);
                Err(err)
            }
        }
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

struct GpiodOutput<'a> {
    driver: &'a GpiodDriver,
    index: usize,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.index)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(&[self.index]);
    }
}

struct GpiodBusOutput<'a, const N: usize> {
    driver: &'a GpiodDriver,
    indices: [usize; N],
    line: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}[output]", self.driver, self.indices)
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.line.set_values(*values)?;
        Ok(())
    }
}

impl<const N: usize> Drop for GpiodBusOutput<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.indices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn open_accepts_any_path_like() {
        assert!(GpiodDriver::open("/dev/charlcd-no-such-chip").is_err());
        assert!(GpiodDriver::open(PathBuf::from("/dev/charlcd-no-such-chip")).is_err());
    }
}
