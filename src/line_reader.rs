use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::Sender;
use log::{debug, info, warn};

use crate::events::StreamEvent;
use crate::serial_utils::sanitize_log_data;
use crate::transport::{ChunkSource, ReadChunk};

/// Sondea una fuente de bytes en un hilo propio y emite lotes de texto.
///
/// Cada lote es el texto decodificado entre dos lecturas vacías. `stop()` es
/// cooperativo: el hilo lo observa al inicio de la siguiente vuelta.
pub struct LineReader {
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl LineReader {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval,
            handle: None,
        }
    }

    /// Inicia el hilo de lectura. Los eventos salen por `events` en orden.
    pub fn start<S>(&mut self, source: S, events: Sender<StreamEvent>)
    where
        S: ChunkSource + 'static,
    {
        self.stop.store(false, Ordering::SeqCst);
        let stop = self.stop.clone();
        let poll_interval = self.poll_interval;

        self.handle = Some(thread::spawn(move || {
            info!("🟡 Hilo de lectura serial iniciado. Esperando datos...");
            read_stream(source, &events, &stop, poll_interval);
            info!("⏹️ Hilo de lectura serial detenido");
        }));
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Espera a que el hilo termine. Llamar después de `stop()` o al cerrar la fuente.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("⚠️ El hilo de lectura terminó con pánico");
            }
        }
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

/// Texto del lote en curso más los bytes de un carácter UTF-8 aún incompleto.
#[derive(Debug, Default)]
struct Batch {
    text: String,
    pending: Vec<u8>,
}

impl Batch {
    /// Decodifica un fragmento. En error descarta el fragmento entero, salvo
    /// que el fallo esté en el carácter arrastrado de la lectura anterior:
    /// entonces solo se descarta ese prefijo y el fragmento se decodifica solo.
    fn decode(&mut self, chunk: &[u8]) -> Result<(), String> {
        let carried = self.pending.len();
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.text.push_str(text);
                self.pending.clear();
                Ok(())
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                // el prefijo ya fue validado por from_utf8
                self.text.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                self.pending.drain(..valid);
                Ok(())
            }
            Err(e) if e.valid_up_to() < carried => {
                // el carácter arrastrado nunca se completó: solo se descarta ese prefijo
                let stale: Vec<u8> = self.pending.drain(..carried).collect();
                let rest = std::mem::take(&mut self.pending);
                let detail = format!(
                    "secuencia UTF-8 incompleta descartada: {}",
                    sanitize_log_data(&stale)
                );
                match self.decode(&rest) {
                    Ok(()) => Err(detail),
                    Err(more) => Err(format!("{}; {}", detail, more)),
                }
            }
            Err(e) => {
                self.pending.clear();
                Err(format!(
                    "secuencia UTF-8 inválida en {}: {}",
                    sanitize_log_data(chunk),
                    e
                ))
            }
        }
    }

    fn flush(&mut self, events: &Sender<StreamEvent>) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let text = std::mem::take(&mut self.text);
        events.send(StreamEvent::MessageReceived(text)).is_ok()
    }
}

fn read_stream<S: ChunkSource>(
    mut source: S,
    events: &Sender<StreamEvent>,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    let mut batch = Batch::default();

    loop {
        if stop.load(Ordering::SeqCst) {
            batch.flush(events);
            break;
        }

        match source.read_chunk() {
            Ok(ReadChunk::Data(bytes)) => {
                debug!("📥 Bytes leídos (crudo): {}", sanitize_log_data(&bytes));
                if let Err(detail) = batch.decode(&bytes) {
                    warn!("❌ {}", detail);
                    if events.send(StreamEvent::ReadError(detail)).is_err() {
                        break;
                    }
                    // lo decodificado antes del fallo se entrega igualmente
                    if !batch.flush(events) {
                        break;
                    }
                }
            }
            Ok(ReadChunk::Empty) => {
                if !batch.flush(events) {
                    break;
                }
                thread::sleep(poll_interval);
            }
            Ok(ReadChunk::Closed) => {
                debug!("🔚 Fuente cerrada");
                batch.flush(events);
                break;
            }
            Err(e) => {
                warn!("❌ Error al leer del puerto serial: {}", e);
                let _ = events.send(StreamEvent::ReadError(e.to_string()));
                batch.flush(events);
                break;
            }
        }
    }

    if !batch.pending.is_empty() {
        let _ = events.send(StreamEvent::ReadError(format!(
            "secuencia UTF-8 incompleta al cerrar: {}",
            sanitize_log_data(&batch.pending)
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::transport::TransportError;

    /// Fuente con lecturas guionizadas; al agotarse devuelve `Closed`.
    struct Script(VecDeque<Result<ReadChunk, TransportError>>);

    impl Script {
        fn new(chunks: Vec<ReadChunk>) -> Self {
            Self(chunks.into_iter().map(Ok).collect())
        }
    }

    impl ChunkSource for Script {
        fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
            self.0.pop_front().unwrap_or(Ok(ReadChunk::Closed))
        }
    }

    fn data(s: &[u8]) -> ReadChunk {
        ReadChunk::Data(s.to_vec())
    }

    fn run(source: Script) -> Vec<StreamEvent> {
        let (tx, rx) = flume::unbounded();
        let mut reader = LineReader::new(Duration::from_millis(1));
        reader.start(source, tx);
        reader.join();
        rx.drain().collect()
    }

    #[test]
    fn batches_between_empty_reads() {
        let events = run(Script::new(vec![
            data(b"12"),
            data(b".5\n"),
            ReadChunk::Empty,
            ReadChunk::Empty,
            data(b"ok\n"),
        ]));
        assert_eq!(
            events,
            vec![
                StreamEvent::MessageReceived("12.5\n".into()),
                StreamEvent::MessageReceived("ok\n".into()),
            ]
        );
    }

    #[test]
    fn decode_error_keeps_text_before_failure() {
        let events = run(Script::new(vec![
            data(b"abc"),
            data(&[0xFF, b'x']),
            data(b"def"),
            ReadChunk::Empty,
        ]));
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::ReadError(_)));
        assert_eq!(events[1], StreamEvent::MessageReceived("abc".into()));
        assert_eq!(events[2], StreamEvent::MessageReceived("def".into()));
    }

    #[test]
    fn unfinished_character_does_not_swallow_next_line() {
        let events = run(Script::new(vec![
            data(b"ok\n\xC3"),
            ReadChunk::Empty,
            data(b"12.5\n"),
            ReadChunk::Empty,
        ]));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::MessageReceived("ok\n".into()));
        assert!(matches!(&events[1], StreamEvent::ReadError(d) if d.contains("\\xC3")));
        assert_eq!(events[2], StreamEvent::MessageReceived("12.5\n".into()));
    }

    #[test]
    fn stop_flushes_accumulated_text() {
        /// Entrega un fragmento y luego lecturas sin bytes, sin marcar lote vacío.
        struct Trickle(bool);
        impl ChunkSource for Trickle {
            fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
                thread::sleep(Duration::from_millis(1));
                if std::mem::replace(&mut self.0, true) {
                    Ok(ReadChunk::Data(Vec::new()))
                } else {
                    Ok(ReadChunk::Data(b"abc".to_vec()))
                }
            }
        }

        let (tx, rx) = flume::unbounded();
        let mut reader = LineReader::new(Duration::from_millis(1));
        reader.start(Trickle(false), tx);
        thread::sleep(Duration::from_millis(20));
        reader.stop();
        reader.join();

        let events: Vec<StreamEvent> = rx.drain().collect();
        assert_eq!(events, vec![StreamEvent::MessageReceived("abc".into())]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let bytes = "ñ\n".as_bytes();
        let events = run(Script::new(vec![
            data(&bytes[..1]),
            data(&bytes[1..]),
            ReadChunk::Empty,
        ]));
        assert_eq!(events, vec![StreamEvent::MessageReceived("ñ\n".into())]);
    }

    #[test]
    fn transport_failure_ends_reading() {
        let mut script = Script::new(vec![data(b"x")]);
        script.0.push_back(Err(TransportError::NotOpen));
        script.0.push_back(Ok(data(b"never")));
        let events = run(script);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::ReadError(_)));
        assert_eq!(events[1], StreamEvent::MessageReceived("x".into()));
    }

    #[test]
    fn stop_is_observed_between_polls() {
        struct Endless;
        impl ChunkSource for Endless {
            fn read_chunk(&mut self) -> Result<ReadChunk, TransportError> {
                Ok(ReadChunk::Empty)
            }
        }

        let (tx, _rx) = flume::unbounded();
        let mut reader = LineReader::new(Duration::from_millis(1));
        reader.start(Endless, tx);
        thread::sleep(Duration::from_millis(5));
        reader.stop();
        reader.join();
        assert!(!reader.is_running());
    }
}
