use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::transport::SharedTransport;

pub const DEMO_HEADER: &str = "sinus1, sinus2(+90dg) \n";

/// Línea de muestra para el ángulo `angle` (radianes).
pub fn sine_sample(angle: f64) -> String {
    let round5 = |v: f64| (v * 1e5).round() / 1e5;
    let val1 = round5(angle.sin());
    let val2 = round5(5.0 * (angle + 90.0).sin());
    format!("{},{}\n", val1, val2)
}

/// Escribe una cabecera y luego dos senoidales en el puerto (normalmente simulado)
/// hasta que se pida parar.
pub fn spawn_sine_wave(
    transport: SharedTransport,
    period: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("🌊 Generador senoidal iniciado");
        if let Err(e) = transport.lock().write(DEMO_HEADER) {
            warn!("⚠️ Generador: no se pudo escribir la cabecera: {}", e);
            return;
        }

        let mut angle = 0.0_f64;
        while !stop.load(Ordering::SeqCst) {
            // el valor se escribe en trozos, como lo haría un print() del dispositivo
            let line = sine_sample(angle);
            let result = line
                .split_inclusive(',')
                .try_for_each(|piece| transport.lock().write(piece));
            if let Err(e) = result {
                warn!("⚠️ Generador detenido: {}", e);
                break;
            }
            angle += 0.1;
            thread::sleep(period);
        }
        info!("🌊 Generador senoidal detenido");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::parse_numeric_vector;
    use crate::transport::{MockTransport, ReadChunk, Transport};
    use parking_lot::Mutex;

    #[test]
    fn samples_are_numeric_pairs() {
        let line = sine_sample(0.0);
        assert!(line.ends_with('\n'));
        let values = parse_numeric_vector(line.trim_end()).expect("numeric");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], 0.0);
        assert!(values[1].abs() <= 5.0);
    }

    #[test]
    fn header_is_not_numeric() {
        assert!(parse_numeric_vector(DEMO_HEADER.trim_end_matches('\n')).is_none());
    }

    #[test]
    fn generator_writes_header_first() {
        let mut mock = MockTransport::new();
        mock.open("/dev/mock", 9600).unwrap();
        let reader = mock.clone();
        let boxed: Box<dyn Transport> = Box::new(mock);
        let transport: SharedTransport = Arc::new(Mutex::new(boxed));
        let stop = Arc::new(AtomicBool::new(true));

        spawn_sine_wave(transport, Duration::from_millis(1), stop)
            .join()
            .unwrap();

        let mut reader = reader;
        assert_eq!(
            reader.read_chunk().unwrap(),
            ReadChunk::Data(DEMO_HEADER.as_bytes().to_vec())
        );
    }
}
