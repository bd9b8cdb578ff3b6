mod config;

use crate::config::Config;
use charlcd::gpiod::GpiodDriver;
use charlcd::lcd::hd44780::driver::{
    CursorDirection, GpioHD44780Driver, HD44780Driver, SimulatedHD44780,
};
use charlcd::lcd::hd44780::{
    Glyph, Lcd, LcdConfig, LcdResult, ENTRY_MODE_INC_NO_SHIFT, VIEW_MODE_DISP_ON_BLK_ON_CRS_ON,
    VIEW_MODE_DISP_ON_BLK_OFF_CRS_OFF,
};
use charlcd::GpioDriver;
use dotenv::{dotenv, var};
use log::{debug, info};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

const BELL: [u8; 8] = [0x04, 0x0E, 0x0E, 0x0E, 0x1F, 0x00, 0x04, 0x00];
const HEART: [u8; 8] = [0x00, 0x0A, 0x1F, 0x1F, 0x0E, 0x04, 0x00, 0x00];

fn parse_pin_bus(pin_str: &str) -> eyre::Result<Vec<usize>> {
    Ok(pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?)
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "charlcd demo v{} on {} ({})",
        env!("CARGO_PKG_VERSION"),
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    let lcd_config = config.to_lcd_config()?;
    debug!("{:?}", lcd_config);

    if var("CHARLCD_DRY_RUN").is_ok_and(|v| v != "0") {
        info!("Dry run, using a simulated controller");
        let mut lcd = Lcd::new(SimulatedHD44780::new(), lcd_config)?;
        run_demo(&mut lcd, Duration::ZERO)?;
        info!("{} bus transfers", lcd.driver().transactions().len());
        for line in lcd.driver().screen(lcd.geometry()) {
            info!("|{}|", line);
        }
        return Ok(());
    }

    let chip = var("CHARLCD_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let pin_e_no: usize = var("CHARLCD_PIN_E")?.parse()?;
    let pin_rs_no: usize = var("CHARLCD_PIN_RS")?.parse()?;
    let pin_rw_no: Option<usize> = var("CHARLCD_PIN_RW").ok().map(|s| s.parse()).transpose()?;
    let data_pin_nos = parse_pin_bus(&var("CHARLCD_PINS_DATA")?)?;

    info!(
        "LCD @ {} E: {}, RS: {}, RW: {:?}, Data: {:?}",
        chip, pin_e_no, pin_rs_no, pin_rw_no, data_pin_nos
    );

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    let pin_e = gpio.get_output(pin_e_no)?;
    let pin_rs = gpio.get_output(pin_rs_no)?;
    let pin_rw = pin_rw_no.map(|no| gpio.get_output(no)).transpose()?;

    match data_pin_nos.len() {
        4 => {
            let pins: [usize; 4] = data_pin_nos.try_into().map_err(|_| eyre::eyre!("4 pins"))?;
            let bus = gpio.get_output_bus(pins)?;
            let driver = GpioHD44780Driver::new_4bit(&*pin_e, pin_rw.as_deref(), &*pin_rs, &*bus);
            run_demo(&mut Lcd::new(driver, lcd_config)?, Duration::from_secs(2))?;
        }
        8 => {
            let pins: [usize; 8] = data_pin_nos.try_into().map_err(|_| eyre::eyre!("8 pins"))?;
            let bus = gpio.get_output_bus(pins)?;
            let driver = GpioHD44780Driver::new_8bit(&*pin_e, pin_rw.as_deref(), &*pin_rs, &*bus);
            run_demo(&mut Lcd::new(driver, lcd_config)?, Duration::from_secs(2))?;
        }
        n => eyre::bail!("Invalid number of data pins: {}, expected 4 or 8", n),
    }

    Ok(())
}

/// Walks through every display operation, pausing between screens.
fn run_demo<D: HD44780Driver>(lcd: &mut Lcd<D>, pause: Duration) -> LcdResult<()> {
    let config: LcdConfig = *lcd.config();
    let columns = config.geometry.columns();

    info!("Initializing LCD...");
    lcd.init()?;

    lcd.put_str("charlcd\tv")?;
    lcd.put_str(env!("CARGO_PKG_VERSION"))?;
    lcd.put_str("\n")?;
    lcd.put_int(-42)?;
    lcd.put_char(b' ')?;
    lcd.put_uint_fixed(7, 3)?;
    lcd.put_char(b' ')?;
    lcd.put_float(3.14159, 2)?;
    sleep(pause);

    debug!("Custom characters");
    lcd.load_char(&Glyph::new(BELL), 0)?;
    lcd.goto(1, columns.saturating_sub(2))?;
    lcd.put_char(0)?;
    lcd.draw_char(&Glyph::new(HEART), 1, 1, columns.saturating_sub(1))?;
    sleep(pause);

    debug!("Scrolling");
    for _ in 0..4 {
        lcd.scroll(CursorDirection::Left)?;
        sleep(pause / 8);
    }
    for _ in 0..4 {
        lcd.scroll(CursorDirection::Right)?;
        sleep(pause / 8);
    }

    debug!("Editing");
    lcd.set_mode(VIEW_MODE_DISP_ON_BLK_ON_CRS_ON)?;
    lcd.set_mode(ENTRY_MODE_INC_NO_SHIFT)?;
    lcd.goto(1, 0)?;
    lcd.put_str("charlcd?")?;
    sleep(pause / 2);
    lcd.backspace()?;
    lcd.cursor_shift(CursorDirection::Left)?;
    lcd.cursor_shift(CursorDirection::Right)?;
    lcd.put_char(b'!')?;
    sleep(pause);
    lcd.set_mode(VIEW_MODE_DISP_ON_BLK_OFF_CRS_OFF)?;

    if let Some(bar) = config.progress_bar {
        debug!("Progress bar");
        let max = bar.max_load();
        for level in (0..=max).step_by(3).chain([max]) {
            lcd.draw_bar(level)?;
            sleep(pause / 40);
        }
        for level in (0..max / 2).rev().step_by(4) {
            lcd.draw_bar(level)?;
            sleep(pause / 40);
        }
        lcd.draw_bar(max / 2)?;
        sleep(pause);
    }

    lcd.home()?;
    info!("Demo finished.");
    Ok(())
}
