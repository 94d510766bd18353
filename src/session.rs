use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use log::{info, warn};
use parking_lot::Mutex;

use crate::assembler::MessageAssembler;
use crate::events::{EventRegistry, StreamEvent};
use crate::line_reader::LineReader;
use crate::plotter::PlotUpdate;
use crate::transport::{SharedTransport, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub address: String,
    pub baud_rate: u32,
    pub poll_interval: Duration,
    /// Añade '\n' a cada envío.
    pub send_end_line: bool,
}

/// Conexión activa: lector en segundo plano más el hilo que ensambla y
/// reparte los eventos. Al soltarla se detiene todo y se cierra el puerto.
pub struct Session {
    transport: SharedTransport,
    reader: LineReader,
    dispatcher: Option<JoinHandle<()>>,
    /// Se marca antes de parar el lector; distingue un cierre pedido de una caída.
    closing: Arc<AtomicBool>,
    send_end_line: bool,
    closed: bool,
}

impl Session {
    /// Abre el transporte y arranca la lectura. Un fallo al abrir se devuelve
    /// sin iniciar ningún hilo.
    pub fn connect(
        mut transport: Box<dyn Transport>,
        options: &SessionOptions,
        registry: EventRegistry,
        updates: Sender<PlotUpdate>,
    ) -> Result<Self, TransportError> {
        transport.open(&options.address, options.baud_rate)?;
        let transport: SharedTransport = Arc::new(Mutex::new(transport));

        let (tx_events, rx_events) = flume::unbounded();
        let mut reader = LineReader::new(options.poll_interval);
        reader.start(transport.clone(), tx_events);

        let closing = Arc::new(AtomicBool::new(false));
        let dispatcher = {
            let closing = closing.clone();
            thread::spawn(move || dispatch(rx_events, registry, updates, &closing))
        };

        info!(
            "✅ Conectado: {} : {} baudios",
            options.address, options.baud_rate
        );
        Ok(Self {
            transport,
            reader,
            dispatcher: Some(dispatcher),
            closing,
            send_end_line: options.send_end_line,
            closed: false,
        })
    }

    /// Envía texto al dispositivo.
    pub fn write(&self, text: &str) -> Result<(), TransportError> {
        let mut transport = self.transport.lock();
        if self.send_end_line {
            transport.write(&format!("{}\n", text))
        } else {
            transport.write(text)
        }
    }

    /// Acceso compartido al transporte (p. ej. para un generador de pruebas).
    pub fn transport(&self) -> SharedTransport {
        self.transport.clone()
    }

    pub fn is_reading(&self) -> bool {
        self.reader.is_running()
    }

    /// La lectura terminó sola (fallo o fin del transporte) sin `disconnect()`.
    pub fn is_lost(&self) -> bool {
        !self.closed && !self.reader.is_running()
    }

    pub fn disconnect(mut self) -> Result<(), TransportError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.closing.store(true, Ordering::SeqCst);
        self.reader.stop();
        self.reader.join();
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                warn!("⚠️ El hilo de despacho terminó con pánico");
            }
        }

        let result = self.transport.lock().close();
        info!("🔌 Sesión cerrada");
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("⚠️ Error cerrando el puerto: {}", e);
        }
    }
}

/// Ensambla los lotes del lector y reparte cada evento, en orden de llegada.
fn dispatch(
    rx: Receiver<StreamEvent>,
    mut registry: EventRegistry,
    updates: Sender<PlotUpdate>,
    closing: &AtomicBool,
) {
    let mut assembler = MessageAssembler::new();

    for event in rx.iter() {
        registry.emit(&event);
        let StreamEvent::MessageReceived(text) = &event else {
            continue;
        };

        let mut numeric = false;
        for parsed in assembler.parse(text) {
            registry.emit(&parsed);
            let update = match &parsed {
                StreamEvent::NumericVector(values) => {
                    numeric = true;
                    Some(PlotUpdate::Values(values.clone()))
                }
                other => match other.terminal_message() {
                    Some(msg) => {
                        // los mensajes numéricos no pueden ser cabecera
                        let header = (!numeric).then(|| PlotUpdate::Message(msg.to_string()));
                        numeric = false;
                        header
                    }
                    None => None,
                },
            };
            if let Some(update) = update {
                // sin graficador conectado los eventos siguen llegando al registro
                let _ = updates.send(update);
            }
        }
    }

    if !closing.load(Ordering::SeqCst) {
        warn!("🔌 Conexión perdida: la lectura terminó sin desconectar");
    }
}
