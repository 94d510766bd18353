//! Acceso al enlace serial: puerto real (`serialport`) o simulado en memoria.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;

use crate::serial_utils::sanitize_log_data;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No se pudo abrir el puerto serial {address}: {source}")]
    Open {
        address: String,
        #[source]
        source: serialport::Error,
    },

    #[error("El puerto no está abierto")]
    NotOpen,

    #[error("Error de E/S en el puerto: {0}")]
    Io(#[from] std::io::Error),
}

/// Resultado de una lectura no bloqueante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    Data(Vec<u8>),
    /// No hay datos por ahora; no es un error.
    Empty,
    /// La fuente terminó.
    Closed,
}

pub trait Transport: Send {
    fn open(&mut self, address: &str, baud_rate: u32) -> Result<(), TransportError>;
    fn is_open(&self) -> bool;
    fn write(&mut self, text: &str) -> Result<(), TransportError>;
    fn close(&mut self) -> Result<(), TransportError>;
    fn read_chunk(&mut self) -> Result<ReadChunk, TransportError>;
}

/// Fuente de fragmentos para el lector en segundo plano.
pub trait ChunkSource: Send {
    fn read_chunk(&mut self) -> Result<ReadChunk, TransportError>;
}

pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

impl ChunkSource for SharedTransport {
    fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
        self.lock().read_chunk()
    }
}

/// Parámetros de línea fijos entre conexiones.
#[derive(Debug, Clone, Copy)]
pub struct LineSettings {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

pub struct SerialTransport {
    settings: LineSettings,
    port: Option<Box<dyn SerialPort>>,
    buffer: [u8; 1024],
}

impl SerialTransport {
    pub fn new(settings: LineSettings) -> Self {
        Self {
            settings,
            port: None,
            buffer: [0u8; 1024],
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, address: &str, baud_rate: u32) -> Result<(), TransportError> {
        self.port = None;
        let port = serialport::new(address, baud_rate)
            .data_bits(self.settings.data_bits)
            .parity(self.settings.parity)
            .stop_bits(self.settings.stop_bits)
            .flow_control(serialport::FlowControl::None)
            // lectura no bloqueante: el lector sondea
            .timeout(Duration::from_secs(0))
            .open()
            .map_err(|source| TransportError::Open {
                address: address.to_string(),
                source,
            })?;
        port.clear(ClearBuffer::Input)
            .map_err(|source| TransportError::Open {
                address: address.to_string(),
                source,
            })?;
        info!("🔌 Puerto {} abierto a {} baudios", address, baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, text: &str) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        port.write_all(text.as_bytes())?;
        port.flush()?;
        debug!("📤 Enviado al puerto: {}", sanitize_log_data(text.as_bytes()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            info!("🔒 Puerto serial cerrado");
        }
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        match port.read(&mut self.buffer) {
            Ok(0) => Ok(ReadChunk::Empty),
            Ok(n) => Ok(ReadChunk::Data(self.buffer[..n].to_vec())),
            Err(ref e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadChunk::Empty)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MockStream {
    pending: VecDeque<u8>,
    byte_sent: bool,
}

/// Puerto simulado: lo escrito vuelve por la lectura.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    stream: Arc<Mutex<MockStream>>,
    open: bool,
    one_byte: bool,
    close_after_read: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entrega un byte por lectura, con una lectura vacía entre bytes.
    pub fn one_byte(mut self, enabled: bool) -> Self {
        self.one_byte = enabled;
        self
    }

    /// Devuelve `Closed` cuando no queda nada por leer.
    pub fn close_after_read(mut self, enabled: bool) -> Self {
        self.close_after_read = enabled;
        self
    }

    /// Encola bytes como si llegaran del dispositivo.
    pub fn feed(&self, bytes: &[u8]) {
        self.stream.lock().pending.extend(bytes);
    }
}

impl Transport for MockTransport {
    fn open(&mut self, address: &str, baud_rate: u32) -> Result<(), TransportError> {
        debug!("🧪 Puerto simulado {} a {} baudios", address, baud_rate);
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.feed(text.as_bytes());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
        let mut stream = self.stream.lock();
        if stream.pending.is_empty() {
            stream.byte_sent = false;
            return Ok(if self.close_after_read {
                ReadChunk::Closed
            } else {
                ReadChunk::Empty
            });
        }

        if !self.one_byte {
            return Ok(ReadChunk::Data(stream.pending.drain(..).collect()));
        }
        if stream.byte_sent {
            stream.byte_sent = false;
            return Ok(ReadChunk::Empty);
        }
        stream.byte_sent = true;
        Ok(ReadChunk::Data(stream.pending.pop_front().into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_loops_writes_back() {
        let mut mock = MockTransport::new();
        assert!(matches!(mock.write("x"), Err(TransportError::NotOpen)));

        mock.open("/dev/mock", 9600).unwrap();
        assert!(mock.is_open());
        mock.write("ab\n").unwrap();
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Data(b"ab\n".to_vec()));
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Empty);
    }

    #[test]
    fn mock_one_byte_interleaves_empty_reads() {
        let mut mock = MockTransport::new().one_byte(true).close_after_read(true);
        mock.feed(b"ab");
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Data(b"a".to_vec()));
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Empty);
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Data(b"b".to_vec()));
        assert_eq!(mock.read_chunk().unwrap(), ReadChunk::Closed);
    }

    #[test]
    fn serial_transport_requires_open() {
        let mut serial = SerialTransport::new(LineSettings::default());
        assert!(!serial.is_open());
        assert!(matches!(serial.read_chunk(), Err(TransportError::NotOpen)));
        assert!(matches!(serial.write("1\n"), Err(TransportError::NotOpen)));
        assert!(serial.close().is_ok());
    }
}
