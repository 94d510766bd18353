use std::collections::VecDeque;

/// Color RGB normalizado a [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        }
    }
}

/// Ventana deslizante de capacidad fija con las últimas `capacity` muestras
/// de un canal. Al llenarse, cada muestra nueva expulsa la más antigua.
#[derive(Debug, Clone)]
pub struct WaveBuffer {
    capacity: usize,
    samples: VecDeque<f64>,
    color: Rgb,
    label: Option<String>,
}

impl WaveBuffer {
    pub fn new(capacity: usize, color: Rgb, label: Option<String>) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            color,
            label: label
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Muestras presentes, de la más antigua a la más reciente.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Vista de longitud `capacity`: muestras primero, `None` en huecos sin llenar.
    pub fn slots(&self) -> Vec<Option<f64>> {
        let mut slots: Vec<Option<f64>> = self.samples.iter().copied().map(Some).collect();
        slots.resize(self.capacity, None);
        slots
    }

    /// (mínimo, máximo) de las muestras presentes.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.samples().fold(None, |acc, y| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey() -> Rgb {
        Rgb::from_u8(128, 128, 128)
    }

    #[test]
    fn fills_then_slides() {
        let mut wave = WaveBuffer::new(3, grey(), None);
        wave.push(1.0);
        wave.push(2.0);
        assert_eq!(wave.slots(), vec![Some(1.0), Some(2.0), None]);
        assert!(!wave.is_full());

        wave.push(3.0);
        wave.push(4.0);
        assert_eq!(wave.samples().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(wave.slots().len(), 3);
        assert!(wave.is_full());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut wave = WaveBuffer::new(0, grey(), None);
        wave.push(1.0);
        assert!(wave.is_empty());
        assert!(wave.slots().is_empty());
    }

    #[test]
    fn bounds_over_present_samples() {
        let mut wave = WaveBuffer::new(4, grey(), None);
        assert_eq!(wave.bounds(), None);
        for y in [3.0, -1.5, 7.0] {
            wave.push(y);
        }
        assert_eq!(wave.bounds(), Some((-1.5, 7.0)));
    }

    #[test]
    fn label_is_trimmed() {
        let wave = WaveBuffer::new(2, grey(), Some(" sinus2(+90dg) ".into()));
        assert_eq!(wave.label(), Some("sinus2(+90dg)"));
        let blank = WaveBuffer::new(2, grey(), Some("  ".into()));
        assert_eq!(blank.label(), None);
    }
}
