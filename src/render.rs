use log::debug;

use crate::wave_set::DrawingFrame;

/// Consumidor de cuadros. Recibe una instantánea por ciclo de dibujo.
pub trait RenderSink: Send {
    fn render(&mut self, frame: &DrawingFrame);
}

impl<F> RenderSink for F
where
    F: FnMut(&DrawingFrame) + Send,
{
    fn render(&mut self, frame: &DrawingFrame) {
        self(frame)
    }
}

/// Resume cada cuadro en el log.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSink for LogRenderer {
    fn render(&mut self, frame: &DrawingFrame) {
        self.frames += 1;
        debug!(
            "🖼️ Cuadro #{}: rango [{:.3}, {:.3}], {} puntos, {} picos",
            self.frames,
            frame.scale.min_y,
            frame.scale.max_y,
            frame.point_count(),
            frame.peak_count()
        );
        for (i, channel) in frame.channels.iter().enumerate() {
            if let Some(last) = channel.points.last() {
                debug!(
                    "   canal {} {:<16} último punto ({:.3}, {:.3})",
                    i,
                    channel.label.as_deref().unwrap_or("-"),
                    last.x,
                    last.y
                );
            }
        }
    }
}
