use chrono::Local;

use crate::events::StreamEvent;

/// Arma las líneas de texto del monitor a partir de los eventos de fragmento.
///
/// Una línea empieza con la hora en que llegó el primer fragmento y termina
/// con el tamaño del mensaje en bytes.
#[derive(Debug, Default)]
pub struct Transcript {
    line: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Procesa un evento; devuelve la línea si quedó completa.
    pub fn on_event(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::FirstPart { chunk, .. } => {
                self.line = format!("{}{}", start_line_info(), chunk);
                None
            }
            StreamEvent::Part { chunk, .. } => {
                self.line.push_str(chunk);
                None
            }
            StreamEvent::LastPart { chunk, accumulated } => {
                self.line.push_str(chunk);
                self.line.push_str(&end_line_info(accumulated));
                Some(std::mem::take(&mut self.line))
            }
            StreamEvent::Whole(msg) => Some(format!(
                "{}{}{}",
                start_line_info(),
                msg,
                end_line_info(msg)
            )),
            _ => None,
        }
    }
}

fn start_line_info() -> String {
    format!("[{}] ", Local::now().format("%H:%M:%S"))
}

fn end_line_info(full_msg: &str) -> String {
    format!(" [{}]", full_msg.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_message_line() {
        let mut transcript = Transcript::new();
        let line = transcript
            .on_event(&StreamEvent::Whole("123.45".into()))
            .expect("line");
        assert!(line.starts_with('['));
        assert!(line.ends_with("123.45 [6]"));
    }

    #[test]
    fn fragments_join_into_one_line() {
        let mut transcript = Transcript::new();
        let events = [
            StreamEvent::FirstPart {
                chunk: "ab".into(),
                accumulated: "ab".into(),
            },
            StreamEvent::Part {
                chunk: "c".into(),
                accumulated: "abc".into(),
            },
            StreamEvent::LastPart {
                chunk: "ñ".into(),
                accumulated: "abcñ".into(),
            },
        ];
        assert_eq!(transcript.on_event(&events[0]), None);
        assert_eq!(transcript.on_event(&events[1]), None);
        let line = transcript.on_event(&events[2]).expect("line");
        // "ñ" ocupa dos bytes
        assert!(line.starts_with('['));
        assert!(line.ends_with("] abcñ [5]"));
        // la línea siguiente empieza de cero
        let next = transcript
            .on_event(&StreamEvent::LastPart {
                chunk: "z".into(),
                accumulated: "z".into(),
            })
            .expect("line");
        assert_eq!(next, "z [1]");
    }

    #[test]
    fn other_events_are_ignored() {
        let mut transcript = Transcript::new();
        assert_eq!(
            transcript.on_event(&StreamEvent::NumericVector(vec![1.0])),
            None
        );
        assert_eq!(
            transcript.on_event(&StreamEvent::MessageReceived("x".into())),
            None
        );
    }
}
