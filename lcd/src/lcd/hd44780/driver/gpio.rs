use crate::lcd::hd44780::driver::{CMD_CLEAR_DISPLAY, CMD_RETURN_HOME, HD44780Driver};
use crate::{GpioBusOutput, GpioOutput, GpioResult};
use log::trace;
use std::thread::sleep;
use std::time::Duration;

/// Time the controller needs after power-on before it accepts the synchronisation sequence.
const POWER_ON_DELAY: Duration = Duration::from_millis(50);
/// Execution time of every command except clear and home, rounded up.
const SHORT_EXECUTION_DELAY: Duration = Duration::from_micros(50);
/// Execution time of clear display and return home, rounded up.
const LONG_EXECUTION_DELAY: Duration = Duration::from_millis(2);
/// Wait between the first two synchronisation transfers.
const SYNC_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(&'a dyn GpioBusOutput<8>),
    Bus4Bit(&'a dyn GpioBusOutput<4>),
}

impl GpioHD44780Bus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus8Bit(_))
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus4Bit(_))
    }
}

/// Parallel HD44780 bus driven by plain GPIO outputs.
///
/// RW is optional. When wired, it is held low: the driver never reads the controller and relies
/// on fixed execution delays instead of the busy flag.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioHD44780Bus<'a>,
}

impl<'a> GpioHD44780Driver<'a> {
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus4Bit(data_bus),
        }
    }

    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<8>,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus8Bit(data_bus),
        }
    }

    fn pulse_e(pin: &dyn GpioOutput) -> GpioResult<()> {
        pin.write(true)?;
        sleep(Duration::from_micros(1));
        pin.write(false)?;
        sleep(Duration::from_micros(1));
        Ok(())
    }

    /// Puts a single nibble on the upper data lines, used only by the 4-bit synchronisation
    /// while the controller still thinks it is on an 8-bit bus.
    fn send_sync_nibble(&self, nibble: u8) -> GpioResult<()> {
        trace!("Sync nibble: {:04b}", nibble);
        self.pin_rs.write(false)?;
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(nibble << 4)?,
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(nibble)?,
        }
        Self::pulse_e(self.pin_e)
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        self.pin_rs.write(rs)?;

        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                bus.write_byte(data)?;
                Self::pulse_e(self.pin_e)?;
            }
            GpioHD44780Bus::Bus4Bit(bus) => {
                let high_nibble = (data >> 4) & 0x0F;
                let low_nibble = data & 0x0F;
                trace!("Writing HN: {:04b}", high_nibble);
                bus.write_nibble(high_nibble)?;
                Self::pulse_e(self.pin_e)?;
                trace!("Writing LN: {:04b}", low_nibble);
                bus.write_nibble(low_nibble)?;
                Self::pulse_e(self.pin_e)?;
            }
        }

        if !rs && (data == CMD_CLEAR_DISPLAY || data & !0b1 == CMD_RETURN_HOME) {
            sleep(LONG_EXECUTION_DELAY);
        } else {
            sleep(SHORT_EXECUTION_DELAY);
        }

        Ok(())
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn init(&mut self, multiline: bool) -> GpioResult<()> {
        sleep(POWER_ON_DELAY);

        // Three times "8-bit" to get out of any half-finished transfer
        self.send_sync_nibble(0b0011)?;
        sleep(SYNC_DELAY);
        self.send_sync_nibble(0b0011)?;
        sleep(SHORT_EXECUTION_DELAY * 3);
        self.send_sync_nibble(0b0011)?;
        sleep(SHORT_EXECUTION_DELAY);
        if self.data_bus.is_4bit() {
            self.send_sync_nibble(0b0010)?;
            sleep(SHORT_EXECUTION_DELAY);
        }

        self.function_set(self.data_bus.is_8bit(), multiline, false)
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Line {
        E,
        Rs,
        Rw,
    }

    /// Latches the data lines on every falling edge of E, like the controller does.
    #[derive(Debug, Default)]
    struct Wires {
        e: bool,
        rs: bool,
        rw: bool,
        data: u8,
        latched: Vec<(bool, u8)>,
    }

    #[derive(Debug)]
    struct WirePin(Line, Rc<RefCell<Wires>>);

    impl GpioOutput for WirePin {
        fn write(&self, value: bool) -> GpioResult<()> {
            let mut wires = self.1.borrow_mut();
            match self.0 {
                Line::E => {
                    if wires.e && !value {
                        assert!(!wires.rw, "RW must stay low while writing");
                        let latched = (wires.rs, wires.data);
                        wires.latched.push(latched);
                    }
                    wires.e = value;
                }
                Line::Rs => wires.rs = value,
                Line::Rw => wires.rw = value,
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct WireBus<const N: usize>(Rc<RefCell<Wires>>);

    impl<const N: usize> GpioBusOutput<N> for WireBus<N> {
        fn write(&self, values: &[bool; N]) -> GpioResult<()> {
            let mut data = 0u8;
            for (i, &bit) in values.iter().enumerate() {
                if bit {
                    data |= 1 << i;
                }
            }
            self.0.borrow_mut().data = data;
            Ok(())
        }
    }

    fn wires() -> (Rc<RefCell<Wires>>, WirePin, WirePin, WirePin) {
        let wires = Rc::new(RefCell::new(Wires::default()));
        (
            wires.clone(),
            WirePin(Line::E, wires.clone()),
            WirePin(Line::Rs, wires.clone()),
            WirePin(Line::Rw, wires),
        )
    }

    #[test]
    fn four_bit_sends_high_nibble_first() {
        let (wires, e, rs, rw) = wires();
        let bus = WireBus::<4>(wires.clone());
        let mut driver = GpioHD44780Driver::new_4bit(&e, Some(&rw as &dyn GpioOutput), &rs, &bus);

        driver.send_data(0xA5).unwrap();
        driver.set_ddram_address(0x40).unwrap();

        assert_eq!(
            wires.borrow().latched,
            vec![(true, 0xA), (true, 0x5), (false, 0xC), (false, 0x0)]
        );
    }

    #[test]
    fn eight_bit_sends_whole_byte() {
        let (wires, e, rs, _rw) = wires();
        let bus = WireBus::<8>(wires.clone());
        let mut driver = GpioHD44780Driver::new_8bit(&e, None, &rs, &bus);

        driver.send_command(0x0C).unwrap();
        driver.send_data(b'A').unwrap();

        assert_eq!(wires.borrow().latched, vec![(false, 0x0C), (true, b'A')]);
    }

    #[test]
    fn four_bit_init_synchronises_then_sets_function() {
        let (wires, e, rs, rw) = wires();
        let bus = WireBus::<4>(wires.clone());
        let mut driver = GpioHD44780Driver::new_4bit(&e, Some(&rw as &dyn GpioOutput), &rs, &bus);

        driver.init(true).unwrap();

        let latched: Vec<u8> = wires.borrow().latched.iter().map(|&(_, d)| d).collect();
        assert_eq!(latched, vec![0x3, 0x3, 0x3, 0x2, 0x2, 0x8]);
        assert!(wires.borrow().latched.iter().all(|&(rs, _)| !rs));
    }
}
