use std::{fs, io::Write, time::Duration};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serialport::{DataBits, Parity, StopBits};
use serde::Deserialize;

use crate::serial_utils::is_standard_baud_rate;
use crate::session::SessionOptions;
use crate::transport::LineSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(
        default = "default_data_bits",
        deserialize_with = "crate::serial_utils::deserialize_data_bits"
    )]
    pub data_bits: DataBits,
    #[serde(
        default = "default_parity",
        deserialize_with = "crate::serial_utils::deserialize_parity"
    )]
    pub parity: Parity,
    #[serde(
        default = "default_stop_bits",
        deserialize_with = "crate::serial_utils::deserialize_stop_bits"
    )]
    pub stop_bits: StopBits,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    #[serde(default = "default_send_end_line")]
    pub send_end_line: bool,
    #[serde(default)]
    pub demo: bool,
}

fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_data_bits() -> DataBits { DataBits::Eight }
fn default_parity() -> Parity { Parity::None }
fn default_stop_bits() -> StopBits { StopBits::One }
fn default_buffer_size() -> usize { 200 }
fn default_poll_interval_ms() -> u64 { 5 }
fn default_update_interval_ms() -> u64 { 10 }
fn default_render_interval_ms() -> u64 { 300 }
fn default_send_end_line() -> bool { true }

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Error leyendo archivo de configuración {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Error parseando archivo TOML con serde")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("buffer_size debe ser mayor que 0");
        }
        if self.poll_interval_ms == 0 || self.update_interval_ms == 0 || self.render_interval_ms == 0 {
            bail!("los intervalos deben ser mayores que 0 ms");
        }
        if !is_standard_baud_rate(self.baud_rate) {
            warn!("⚠️ Velocidad no estándar: {} baudios", self.baud_rate);
        }
        Ok(())
    }

    pub fn line_settings(&self) -> LineSettings {
        LineSettings {
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            address: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            send_end_line: self.send_end_line,
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn log_config(&self) {
        info!("📦 Configuración cargada:");
        info!("  Serial port           : {}", self.serial_port);
        info!("  Baud rate             : {}", self.baud_rate);
        info!("  Data bits             : {:?}", self.data_bits);
        info!("  Parity                : {:?}", self.parity);
        info!("  Stop bits             : {:?}", self.stop_bits);
        info!("  Muestras por canal    : {}", self.buffer_size);
        info!("  Sondeo (ms)           : {}", self.poll_interval_ms);
        info!("  Actualización (ms)    : {}", self.update_interval_ms);
        info!("  Dibujo (ms)           : {}", self.render_interval_ms);
        info!("  Fin de línea al enviar: {}", self.send_end_line);
        info!("  Modo demo             : {}", self.demo);
    }
}

pub fn init_logging() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}
