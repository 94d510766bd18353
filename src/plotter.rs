//! Hilos periódicos del graficador: aplicar actualizaciones y disparar el dibujo.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError};
use log::{debug, info};

use crate::cache::SharedFrameCache;
use crate::render::RenderSink;
use crate::wave_set::{SharedWaveSet, WaveSet};

/// Trabajo pendiente para el conjunto de ondas, en orden de llegada.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotUpdate {
    Values(Vec<f64>),
    /// Cuerpo de un mensaje completo; candidato a cabecera de etiquetas.
    Message(String),
    Reset,
}

/// Aplica una actualización. Devuelve `true` si cambió el contenido.
pub fn apply_update(set: &mut WaveSet, update: PlotUpdate) -> bool {
    match update {
        PlotUpdate::Values(values) => {
            set.apply(&values);
            true
        }
        PlotUpdate::Message(msg) => set.ingest_labels(&msg),
        PlotUpdate::Reset => {
            info!("🧹 Gráfica reiniciada");
            set.reset();
            true
        }
    }
}

/// Recalcula el cuadro y lo publica en la caché.
pub fn refresh_frame(waves: &SharedWaveSet, frames: &SharedFrameCache) {
    let frame = waves.lock().prepare_drawing_data();
    let mut cache = frames.lock();
    match frame {
        Some(frame) => cache.set(frame),
        None => cache.clear(),
    }
}

/// Espera actualizaciones hasta `interval`, las aplica todas y prepara el cuadro.
pub fn spawn_update_thread(
    updates: Receiver<PlotUpdate>,
    waves: SharedWaveSet,
    frames: SharedFrameCache,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("📈 Hilo de actualización iniciado");
        while !stop.load(Ordering::SeqCst) {
            let first = match updates.recv_timeout(interval) {
                Ok(update) => update,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let changed = {
                let mut set = waves.lock();
                let mut changed = apply_update(&mut set, first);
                for update in updates.try_iter() {
                    changed |= apply_update(&mut set, update);
                }
                changed
            };
            if changed {
                refresh_frame(&waves, &frames);
            }
        }
        debug!("📈 Hilo de actualización detenido");
    })
}

/// Entrega el último cuadro al consumidor cada `interval`.
pub fn spawn_render_thread<R>(
    frames: SharedFrameCache,
    mut sink: R,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    R: RenderSink + 'static,
{
    thread::spawn(move || {
        debug!("🖼️ Hilo de dibujo iniciado");
        while !stop.load(Ordering::SeqCst) {
            let snapshot = frames.lock().snapshot();
            if let Some(frame) = snapshot {
                sink.render(&frame);
            }
            thread::sleep(interval);
        }
        debug!("🖼️ Hilo de dibujo detenido");
    })
}
