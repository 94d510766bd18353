use once_cell::sync::Lazy;
use regex::Regex;

/// Órdenes escritas en la consola del monitor.
#[derive(Debug, PartialEq, Eq)]
pub enum Comando {
    Reset,
    Salir,
    /// Abre una sesión nueva con la configuración cargada.
    Conectar,
    Desconectar,
    /// Texto a enviar al dispositivo tal cual.
    Enviar(String),
}

static RE_CMD_RESET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/reset\s*$").unwrap());
static RE_CMD_SALIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(salir|quit)\s*$").unwrap());
static RE_CMD_CONECTAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(conectar|connect)\s*$").unwrap());
static RE_CMD_DESCONECTAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(desconectar|disconnect)\s*$").unwrap());

impl Comando {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim_end_matches(['\r', '\n']);
        if RE_CMD_RESET.is_match(input) {
            Some(Comando::Reset)
        } else if RE_CMD_SALIR.is_match(input) {
            Some(Comando::Salir)
        } else if RE_CMD_CONECTAR.is_match(input) {
            Some(Comando::Conectar)
        } else if RE_CMD_DESCONECTAR.is_match(input) {
            Some(Comando::Desconectar)
        } else if input.trim().is_empty() {
            None
        } else {
            Some(Comando::Enviar(input.to_string()))
        }
    }
}
