use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use crate::wave_set::DrawingFrame;

pub type SharedFrameCache = Arc<Mutex<FrameCache>>;

/// Último cuadro preparado, leído por el hilo de dibujo sin tocar las ondas.
pub struct FrameCache {
    data: Option<(DrawingFrame, Instant)>,
}

impl FrameCache {
    /// Crea una nueva instancia vacía
    pub fn new() -> Self {
        Self { data: None }
    }

    /// Establece un nuevo cuadro con su timestamp
    pub fn set(&mut self, frame: DrawingFrame) {
        self.data = Some((frame, Instant::now()));
    }

    pub fn clear(&mut self) {
        self.data = None;
    }

    /// Copia del cuadro actual
    pub fn snapshot(&self) -> Option<DrawingFrame> {
        self.data.as_ref().map(|(frame, _)| frame.clone())
    }

    /// Retorna una representación del último cuadro (para debugging/logs)
    pub fn debug_last_value(&self) -> String {
        match &self.data {
            Some((frame, t)) => format!(
                "Último cuadro: {} canales, {} puntos (hace {:?})",
                frame.channels.len(),
                frame.point_count(),
                t.elapsed()
            ),
            None => "Sin cuadro".to_string(),
        }
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave_set::WaveSet;

    #[test]
    fn stores_and_clears_snapshot() {
        let mut set = WaveSet::new(4);
        set.apply(&[1.0, 2.0]);
        let frame = set.prepare_drawing_data().expect("frame");

        let mut cache = FrameCache::new();
        assert!(cache.snapshot().is_none());
        assert_eq!(cache.debug_last_value(), "Sin cuadro");

        cache.set(frame.clone());
        assert_eq!(cache.snapshot(), Some(frame));
        assert!(cache.debug_last_value().starts_with("Último cuadro: 2 canales, 2 puntos"));

        cache.clear();
        assert!(cache.snapshot().is_none());
    }
}
