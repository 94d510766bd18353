use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::assembler::{field_separator, parse_numeric_vector};
use crate::wave::{Rgb, WaveBuffer};

pub type SharedWaveSet = Arc<Mutex<WaveSet>>;

/// dirty blue, scarlet, dark mint
const PALETTE: [(u8, u8, u8); 3] = [(102, 168, 203), (224, 56, 44), (41, 155, 73)];

/// Rango vertical común a todos los canales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min_y: f64,
    pub max_y: f64,
}

/// Coordenada normalizada al cuadrado unidad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub label: Option<String>,
    pub color: Rgb,
    pub points: Vec<Point>,
    pub maxima: Vec<Point>,
    pub minima: Vec<Point>,
}

/// Instantánea lista para dibujar. Modificarla no afecta a los buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingFrame {
    pub scale: Scale,
    pub channels: Vec<ChannelFrame>,
}

impl DrawingFrame {
    pub fn point_count(&self) -> usize {
        self.channels.iter().map(|c| c.points.len()).sum()
    }

    pub fn peak_count(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.maxima.len() + c.minima.len())
            .sum()
    }
}

/// Conjunto ordenado de canales con colores cíclicos y etiquetas posicionales.
#[derive(Debug)]
pub struct WaveSet {
    buffer_size: usize,
    waves: Vec<WaveBuffer>,
    labels: Vec<String>,
    labels_applied: bool,
    color_counter: usize,
    label_counter: usize,
}

impl WaveSet {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            waves: Vec::new(),
            labels: Vec::new(),
            labels_applied: false,
            color_counter: 0,
            label_counter: 0,
        }
    }

    pub fn shared(buffer_size: usize) -> SharedWaveSet {
        Arc::new(Mutex::new(Self::new(buffer_size)))
    }

    pub fn waves(&self) -> &[WaveBuffer] {
        &self.waves
    }

    pub fn wave(&self, index: usize) -> Option<&WaveBuffer> {
        self.waves.get(index)
    }

    pub fn count_waves(&self) -> usize {
        self.waves.len()
    }

    pub fn labels_applied(&self) -> bool {
        self.labels_applied
    }

    fn next_color(&mut self) -> Rgb {
        let (r, g, b) = PALETTE[self.color_counter];
        self.color_counter = (self.color_counter + 1) % PALETTE.len();
        Rgb::from_u8(r, g, b)
    }

    fn next_label(&mut self) -> Option<String> {
        let label = self.labels.get(self.label_counter).cloned();
        if label.is_some() {
            self.label_counter += 1;
        }
        label
    }

    fn create_wave(&mut self) {
        let color = self.next_color();
        let label = self.next_label();
        debug!("➕ Canal {} creado (etiqueta: {:?})", self.waves.len(), label);
        self.waves.push(WaveBuffer::new(self.buffer_size, color, label));
    }

    /// Empuja `values[i]` en el canal `i`, creando los canales que falten.
    pub fn apply(&mut self, values: &[f64]) {
        while self.waves.len() < values.len() {
            self.create_wave();
        }
        for (wave, &value) in self.waves.iter_mut().zip(values) {
            wave.push(value);
        }
    }

    /// Toma las etiquetas de un mensaje de cabecera. Solo la primera cabecera
    /// que se pueda dividir cuenta; los mensajes numéricos no son cabeceras.
    pub fn ingest_labels(&mut self, message: &str) -> bool {
        if self.labels_applied || parse_numeric_vector(message).is_some() {
            return false;
        }
        let Some(sep) = field_separator(message) else {
            return false;
        };
        self.labels.extend(message.split(sep).map(|l| l.trim().to_string()));
        self.labels_applied = true;
        info!("🏷️ Etiquetas de canales: {:?}", self.labels);
        true
    }

    /// Rango vertical con margen. `None` si ningún canal tiene muestras.
    pub fn compute_scale(&self) -> Option<Scale> {
        let (min_y, mut max_y) = self
            .waves
            .iter()
            .filter_map(WaveBuffer::bounds)
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))?;

        if min_y < 0.0 {
            max_y += -min_y;
        }
        let space = max_y / 10.0;
        Some(Scale {
            min_y: min_y - space / 2.0,
            max_y: max_y + space,
        })
    }

    /// Coordenadas normalizadas y picos locales de cada canal.
    pub fn prepare_drawing_data(&self) -> Option<DrawingFrame> {
        let scale = self.compute_scale()?;
        if scale.max_y == 0.0 {
            return None;
        }

        let channels = self
            .waves
            .iter()
            .map(|wave| channel_frame(wave, scale, self.buffer_size))
            .collect();
        Some(DrawingFrame { scale, channels })
    }

    /// Vacía canales, etiquetas y contadores.
    pub fn reset(&mut self) {
        self.waves.clear();
        self.labels.clear();
        self.labels_applied = false;
        self.color_counter = 0;
        self.label_counter = 0;
    }
}

fn channel_frame(wave: &WaveBuffer, scale: Scale, size: usize) -> ChannelFrame {
    let samples: Vec<f64> = wave.samples().collect();
    let count = samples.len();

    let mut points = Vec::with_capacity(count);
    let mut maxima = Vec::new();
    let mut minima = Vec::new();

    for (i, &y) in samples.iter().enumerate() {
        let point = Point {
            x: (i + 1) as f64 / size as f64,
            y: (y - scale.min_y) / scale.max_y,
        };
        // los dos primeros y el último no se evalúan
        if i >= 2 && i + 1 < count {
            let (left, right) = (samples[i - 1], samples[i + 1]);
            if y > left && y > right {
                maxima.push(point);
            }
            if y < left && y < right {
                minima.push(point);
            }
        }
        points.push(point);
    }

    ChannelFrame {
        label: wave.label().map(str::to_string),
        color: wave.color(),
        points,
        maxima,
        minima,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn channels_created_lazily_with_cyclic_colors() {
        let mut set = WaveSet::new(10);
        set.apply(&[1.0]);
        assert_eq!(set.count_waves(), 1);

        set.apply(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(set.count_waves(), 4);
        assert_eq!(set.wave(0).map(|w| w.color()), set.wave(3).map(|w| w.color()));
        assert_ne!(set.wave(0).map(|w| w.color()), set.wave(1).map(|w| w.color()));
        assert_eq!(set.wave(0).map(|w| w.len()), Some(2));
        assert_eq!(set.wave(3).map(|w| w.len()), Some(1));

        // un vector más corto no elimina canales
        set.apply(&[5.0]);
        assert_eq!(set.count_waves(), 4);
    }

    #[test]
    fn labels_are_assigned_once_in_order() {
        let mut set = WaveSet::new(10);
        assert!(!set.ingest_labels("1.0,2.0"));
        assert!(!set.ingest_labels("hello"));
        assert!(set.ingest_labels("sinus1, sinus2(+90dg) "));
        assert!(!set.ingest_labels("otra, cabecera"));

        set.apply(&[0.1, 0.2, 0.3]);
        let labels: Vec<Option<&str>> = set.waves().iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec![Some("sinus1"), Some("sinus2(+90dg)"), None]);
    }

    #[test]
    fn scale_widens_for_negative_minimum() {
        let mut set = WaveSet::new(10);
        set.apply(&[-2.0, 5.0]);
        let scale = set.compute_scale().expect("scale");
        // max 5 + 2 = 7, margen 0.7
        assert!(close(scale.max_y, 7.7));
        assert!(close(scale.min_y, -2.35));
    }

    #[test]
    fn scale_for_positive_samples() {
        let mut set = WaveSet::new(10);
        set.apply(&[2.0]);
        set.apply(&[10.0]);
        let scale = set.compute_scale().expect("scale");
        assert!(close(scale.max_y, 11.0));
        assert!(close(scale.min_y, 1.5));
    }

    #[test]
    fn empty_set_has_no_frame() {
        let set = WaveSet::new(10);
        assert_eq!(set.compute_scale(), None);
        assert_eq!(set.prepare_drawing_data(), None);
    }

    #[test]
    fn all_zero_samples_skip_preparation() {
        let mut set = WaveSet::new(10);
        set.apply(&[0.0]);
        assert!(set.compute_scale().is_some());
        assert_eq!(set.prepare_drawing_data(), None);
    }

    #[test]
    fn coordinates_are_normalized() {
        let mut set = WaveSet::new(4);
        for y in [1.0, 3.0] {
            set.apply(&[y]);
        }
        let frame = set.prepare_drawing_data().expect("frame");
        let scale = frame.scale;
        let points = &frame.channels[0].points;
        assert_eq!(points.len(), 2);
        assert!(close(points[0].x, 0.25));
        assert!(close(points[1].x, 0.5));
        assert!(close(points[0].y, (1.0 - scale.min_y) / scale.max_y));
        assert!(close(points[1].y, (3.0 - scale.min_y) / scale.max_y));
    }

    #[test]
    fn peaks_skip_first_two_and_last() {
        let mut set = WaveSet::new(10);
        // el índice 1 es máximo pero no se evalúa; 3 máximo; 2 y 4 mínimos
        for y in [0.0, 5.0, 1.0, 4.0, 2.0, 3.0, 9.0] {
            set.apply(&[y]);
        }
        let frame = set.prepare_drawing_data().expect("frame");
        let channel = &frame.channels[0];
        assert_eq!(channel.points.len(), 7);
        assert_eq!(channel.maxima, vec![channel.points[3]]);
        assert_eq!(channel.minima, vec![channel.points[2], channel.points[4]]);
    }

    #[test]
    fn reset_then_replay_is_identical() {
        let vectors = [vec![1.0, -1.0], vec![2.0, 0.5, 3.0], vec![0.0, 1.5]];
        let mut set = WaveSet::new(5);
        set.ingest_labels("a,b");
        for v in &vectors {
            set.apply(v);
        }
        let before = set.prepare_drawing_data();

        set.reset();
        assert_eq!(set.count_waves(), 0);
        assert!(!set.labels_applied());

        set.ingest_labels("a,b");
        for v in &vectors {
            set.apply(v);
        }
        assert_eq!(set.prepare_drawing_data(), before);
        assert_eq!(set.count_waves(), 3);
    }
}
