use log::debug;

use crate::events::StreamEvent;

/// Ensambla mensajes terminados en '\n' a partir de fragmentos de texto de
/// longitud arbitraria.
///
/// `ready` indica que no hay un mensaje a medio recibir; mientras es `false`
/// el cuerpo parcial vive en `accumulator`.
#[derive(Debug)]
pub struct MessageAssembler {
    ready: bool,
    accumulator: String,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            ready: true,
            accumulator: String::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    /// Descarta cualquier mensaje parcial (desconexión).
    pub fn reset(&mut self) {
        self.ready = true;
        self.accumulator.clear();
    }

    /// Clasifica un lote de texto y devuelve los eventos en orden de emisión.
    ///
    /// Un lote con varios saltos de línea se procesa tramo a tramo, cada tramo
    /// terminado en '\n' como una unidad.
    pub fn parse(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for piece in text.split_inclusive('\n') {
            self.parse_piece(piece, &mut events);
        }
        events
    }

    fn parse_piece(&mut self, piece: &str, events: &mut Vec<StreamEvent>) {
        let cleaned = piece.replace('\r', "");
        if cleaned.is_empty() {
            return;
        }

        let terminated = cleaned.ends_with('\n');
        let content = cleaned.strip_suffix('\n').unwrap_or(&cleaned).to_string();

        if self.ready && terminated {
            if let Some(values) = parse_numeric_vector(&content) {
                events.push(StreamEvent::NumericVector(values));
            }
            events.push(StreamEvent::Whole(content));
            self.accumulator.clear();
            return;
        }

        self.accumulator.push_str(&content);

        if terminated {
            self.ready = true;
            if let Some(values) = parse_numeric_vector(&self.accumulator) {
                events.push(StreamEvent::NumericVector(values));
            }
            let accumulated = std::mem::take(&mut self.accumulator);
            debug!("🧩 Mensaje completo tras fragmentos: {}", accumulated);
            events.push(StreamEvent::LastPart {
                chunk: content,
                accumulated,
            });
        } else if self.ready {
            self.ready = false;
            events.push(StreamEvent::FirstPart {
                chunk: content,
                accumulated: self.accumulator.clone(),
            });
        } else {
            events.push(StreamEvent::Part {
                chunk: content,
                accumulated: self.accumulator.clone(),
            });
        }
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Separador de campos: coma si existe, si no espacio.
pub fn field_separator(text: &str) -> Option<char> {
    if text.contains(',') {
        Some(',')
    } else if text.contains(' ') {
        Some(' ')
    } else {
        None
    }
}

/// Decodifica un cuerpo como vector de números. `None` si algún campo no lo es.
pub fn parse_numeric_vector(text: &str) -> Option<Vec<f64>> {
    match field_separator(text) {
        Some(sep) => text
            .split(sep)
            .map(|field| field.trim().parse::<f64>().ok())
            .collect(),
        None => text.trim().parse::<f64>().ok().map(|v| vec![v]),
    }
}
