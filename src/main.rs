use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;

use rs232_monitor::cache::FrameCache;
use rs232_monitor::command::Comando;
use rs232_monitor::config::{self, Config};
use rs232_monitor::demo;
use rs232_monitor::display::Transcript;
use rs232_monitor::events::{EventKind, EventRegistry};
use rs232_monitor::plotter::{self, PlotUpdate};
use rs232_monitor::render::LogRenderer;
use rs232_monitor::session::Session;
use rs232_monitor::transport::{MockTransport, SerialTransport, Transport};
use rs232_monitor::wave_set::WaveSet;

fn main() -> Result<()> {
    config::init_logging();

    // Leer el argumento de línea de comandos (opcional)
    let args: Vec<String> = std::env::args().collect();
    let config_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "config.toml".to_string()
    };

    info!("📄 Cargando configuración desde {}", config_path);
    let config = Config::load_from_file(&config_path)?;
    config.log_config();

    let read_errors = Arc::new(AtomicUsize::new(0));
    let (tx_updates, rx_updates) = flume::unbounded();
    let stop = Arc::new(AtomicBool::new(false));
    let waves = WaveSet::shared(config.buffer_size);
    let frames = Arc::new(Mutex::new(FrameCache::new()));

    let threads = vec![
        plotter::spawn_update_thread(
            rx_updates,
            waves,
            frames.clone(),
            config.update_interval(),
            stop.clone(),
        ),
        plotter::spawn_render_thread(
            frames.clone(),
            LogRenderer::new(),
            config.render_interval(),
            stop.clone(),
        ),
    ];

    let mut connector = Connector {
        config: &config,
        read_errors: read_errors.clone(),
        updates: tx_updates.clone(),
        stop: stop.clone(),
        generators: Vec::new(),
    };
    // un fallo al abrir deja el monitor desconectado; /conectar lo reintenta
    let session = connector.connect().map_err(|e| warn!("⚠️ {:#}", e)).ok();

    info!("⌨️ Consola lista: texto para enviar, /conectar, /desconectar, /reset o /salir");
    let session = run_console(&mut connector, session, &tx_updates)?;

    stop.store(true, Ordering::SeqCst);
    if let Some(session) = session {
        if let Err(e) = session.disconnect() {
            warn!("⚠️ Error al desconectar: {}", e);
        }
    }
    for handle in threads.into_iter().chain(connector.generators.drain(..)) {
        if handle.join().is_err() {
            warn!("⚠️ Un hilo terminó con pánico");
        }
    }

    info!("{}", frames.lock().debug_last_value());
    info!(
        "👋 Monitor detenido ({} errores de lectura)",
        read_errors.load(Ordering::SeqCst)
    );
    Ok(())
}

/// Lo necesario para abrir una sesión nueva desde la consola. Las ondas viven
/// en el hilo de actualización y sobreviven a cada reconexión.
struct Connector<'a> {
    config: &'a Config,
    read_errors: Arc<AtomicUsize>,
    updates: flume::Sender<PlotUpdate>,
    stop: Arc<AtomicBool>,
    generators: Vec<JoinHandle<()>>,
}

impl Connector<'_> {
    fn connect(&mut self) -> Result<Session> {
        let transport: Box<dyn Transport> = if self.config.demo {
            Box::new(MockTransport::new().one_byte(true))
        } else {
            Box::new(SerialTransport::new(self.config.line_settings()))
        };
        let session = Session::connect(
            transport,
            &self.config.session_options(),
            build_registry(self.read_errors.clone()),
            self.updates.clone(),
        )
        .with_context(|| format!("No se pudo conectar a {}", self.config.serial_port))?;

        if self.config.demo {
            // el generador se detiene solo cuando el puerto de esta sesión se cierra
            self.generators.retain(|h| !h.is_finished());
            self.generators.push(demo::spawn_sine_wave(
                session.transport(),
                Duration::from_millis(20),
                self.stop.clone(),
            ));
        }
        Ok(session)
    }
}

/// Suelta la sesión si su lectura terminó sin que nadie la desconectara.
fn drop_lost(session: &mut Option<Session>) {
    if session.as_ref().is_some_and(Session::is_lost) {
        warn!("🔌 Conexión perdida; use /conectar para reintentar");
        if let Some(Err(e)) = session.take().map(Session::disconnect) {
            warn!("⚠️ Error cerrando el puerto: {}", e);
        }
    }
}

/// Lee órdenes de stdin. Sin consola (EOF) sigue mientras la sesión lea.
/// Devuelve la sesión que quede abierta al salir.
fn run_console(
    connector: &mut Connector,
    mut session: Option<Session>,
    updates: &flume::Sender<PlotUpdate>,
) -> Result<Option<Session>> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Error leyendo la consola")?;
        drop_lost(&mut session);
        match Comando::parse(&line) {
            Some(Comando::Reset) => {
                let _ = updates.send(PlotUpdate::Reset);
            }
            Some(Comando::Salir) => return Ok(session),
            Some(Comando::Conectar) if session.is_some() => {
                info!("ℹ️ Ya hay una sesión abierta");
            }
            Some(Comando::Conectar) => match connector.connect() {
                Ok(opened) => session = Some(opened),
                Err(e) => warn!("⚠️ {:#}", e),
            },
            Some(Comando::Desconectar) => match session.take() {
                Some(open) => {
                    if let Err(e) = open.disconnect() {
                        warn!("⚠️ Error al desconectar: {}", e);
                    }
                }
                None => info!("ℹ️ No hay sesión abierta"),
            },
            Some(Comando::Enviar(text)) => match &session {
                Some(open) => match open.write(&text) {
                    Ok(()) => info!("📤 Enviado: {}", text),
                    Err(e) => warn!("⚠️ {}", e),
                },
                None => warn!("⚠️ Sin conexión: use /conectar antes de enviar"),
            },
            None => {}
        }
    }

    while session.as_ref().is_some_and(Session::is_reading) {
        thread::sleep(Duration::from_millis(100));
    }
    drop_lost(&mut session);
    Ok(session)
}

fn build_registry(read_errors: Arc<AtomicUsize>) -> EventRegistry {
    let mut registry = EventRegistry::new();

    let transcript = Arc::new(Mutex::new(Transcript::new()));
    for kind in [
        EventKind::FirstPart,
        EventKind::Part,
        EventKind::LastPart,
        EventKind::Whole,
    ] {
        let transcript = transcript.clone();
        registry.connect(kind, move |event| {
            if let Some(line) = transcript.lock().on_event(event) {
                info!("💬 {}", line);
            }
        });
    }

    registry.connect(EventKind::ReadError, move |_| {
        read_errors.fetch_add(1, Ordering::SeqCst);
    });
    registry.connect(EventKind::NumericVector, |event| {
        debug!("🔢 {:?}", event);
    });
    registry
}
