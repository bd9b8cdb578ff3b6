use charlcd::lcd::hd44780::{DisplayGeometry, LcdConfig, LcdResult, ProgressBarConfig};
use dotenv::var;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "charlcd.json";

/// Display settings kept next to the binary, so a different module only needs a new file.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub lines: u8,
    pub columns: u8,
    pub formatted_output: bool,
    pub tab_width: u8,
    pub progress_bar: Option<BarConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct BarConfig {
    pub line: u8,
    #[serde(default)]
    pub start_column: u8,
    pub cells: u8,
    #[serde(default = "allow_regress_default")]
    pub allow_regress: bool,
}

fn allow_regress_default() -> bool {
    true
}

fn config_path() -> PathBuf {
    PathBuf::from(var("CHARLCD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string()))
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn to_lcd_config(&self) -> LcdResult<LcdConfig> {
        let mut config = LcdConfig::new(DisplayGeometry::new(self.lines, self.columns)?)
            .with_formatted_output(self.formatted_output)
            .with_tab_width(self.tab_width);
        if let Some(bar) = self.progress_bar {
            config = config.with_progress_bar(
                ProgressBarConfig::new(bar.line, bar.start_column, bar.cells)
                    .with_regress(bar.allow_regress),
            );
        }
        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lines: 2,
            columns: 16,
            formatted_output: true,
            tab_width: 4,
            progress_bar: Some(BarConfig {
                line: 2,
                start_column: 0,
                cells: 16,
                allow_regress: true,
            }),
        }
    }
}
