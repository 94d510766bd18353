//! Eventos del flujo serial y registro de manejadores por instancia.

use std::collections::HashMap;

/// Eventos producidos por el lector y el ensamblador de mensajes.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Lote de texto decodificado entre dos lecturas vacías.
    MessageReceived(String),
    /// Fallo de decodificación o de lectura. No detiene el flujo de decodificación.
    ReadError(String),
    FirstPart { chunk: String, accumulated: String },
    Part { chunk: String, accumulated: String },
    LastPart { chunk: String, accumulated: String },
    Whole(String),
    NumericVector(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageReceived,
    ReadError,
    FirstPart,
    Part,
    LastPart,
    Whole,
    NumericVector,
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::MessageReceived(_) => EventKind::MessageReceived,
            StreamEvent::ReadError(_) => EventKind::ReadError,
            StreamEvent::FirstPart { .. } => EventKind::FirstPart,
            StreamEvent::Part { .. } => EventKind::Part,
            StreamEvent::LastPart { .. } => EventKind::LastPart,
            StreamEvent::Whole(_) => EventKind::Whole,
            StreamEvent::NumericVector(_) => EventKind::NumericVector,
        }
    }

    /// Cuerpo completo del mensaje si el evento cierra uno (`Whole` o `LastPart`).
    pub fn terminal_message(&self) -> Option<&str> {
        match self {
            StreamEvent::Whole(msg) => Some(msg),
            StreamEvent::LastPart { accumulated, .. } => Some(accumulated),
            _ => None,
        }
    }
}

pub type Handler = Box<dyn FnMut(&StreamEvent) + Send>;

/// Manejadores suscritos por tipo de evento. Cada componente tiene el suyo.
#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Entrega el evento a los manejadores de su tipo, en orden de suscripción.
    pub fn emit(&mut self, event: &StreamEvent) {
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}
