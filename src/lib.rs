//! Monitor de enlace serial: lectura en segundo plano, ensamblado de mensajes
//! terminados en '\n' y ventanas deslizantes por canal listas para graficar.
//!
//! Flujo: transporte → [`line_reader::LineReader`] → [`assembler::MessageAssembler`]
//! → [`wave_set::WaveSet`] → [`wave_set::DrawingFrame`] → consumidor de dibujo.

pub mod assembler;
pub mod cache;
pub mod command;
pub mod config;
pub mod demo;
pub mod display;
pub mod events;
pub mod line_reader;
pub mod plotter;
pub mod render;
pub mod serial_utils;
pub mod session;
pub mod transport;
pub mod wave;
pub mod wave_set;
