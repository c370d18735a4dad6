use clap::{Args, Subcommand, ValueEnum};
use mtbridge_frame::WireProtocol;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod probe;
pub mod send;
pub mod serve;
pub mod version;

const CLIENT_HOST: &str = "127.0.0.1";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an echo endpoint that replies with the buffer each request reached.
    Serve(ServeArgs),
    /// Send one message and print the reply.
    Send(SendArgs),
    /// Send the empty probe message and wait for the empty reply.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Message framing on the TCP connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Wire {
    /// ZeroMQ REQ/REP (ZMTP 3), talks to stock ZeroMQ peers.
    #[default]
    Zmtp,
    /// "MB" + u32 length prefix per message.
    Native,
}

impl From<Wire> for WireProtocol {
    fn from(wire: Wire) -> Self {
        match wire {
            Wire::Zmtp => WireProtocol::Zmtp,
            Wire::Native => WireProtocol::Native,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind (`*` for every interface).
    #[arg(long, env = "MTBRIDGE_HOST", default_value = mtbridge_transport::ANY_HOST)]
    pub host: String,
    /// Port to bind.
    #[arg(long, env = "MTBRIDGE_PORT", default_value_t = mtbridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Exit after answering N requests (probes excluded).
    #[arg(long)]
    pub count: Option<usize>,
    /// Create an indicator before serving, as NAME:SYMBOL:PERIOD. Repeatable.
    #[arg(long = "indicator", value_name = "NAME:SYMBOL:PERIOD")]
    pub indicators: Vec<String>,
    /// Message framing.
    #[arg(long, env = "MTBRIDGE_WIRE", value_enum, default_value_t = Wire::Zmtp)]
    pub wire: Wire,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint host.
    #[arg(long, env = "MTBRIDGE_HOST", default_value = CLIENT_HOST)]
    pub host: String,
    /// Endpoint port.
    #[arg(long, env = "MTBRIDGE_PORT", default_value_t = mtbridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Integers (comma-separated).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, conflicts_with = "json")]
    pub ints: Option<Vec<i64>>,
    /// Reals (comma-separated).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, conflicts_with = "json")]
    pub reals: Option<Vec<f64>>,
    /// Texts (comma-separated).
    #[arg(long, value_delimiter = ',', conflicts_with = "json")]
    pub texts: Option<Vec<String>>,
    /// Whole message as JSON, e.g. `[[600,1],[1.5],["ok"]]`.
    #[arg(long)]
    pub json: Option<String>,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Message framing.
    #[arg(long, env = "MTBRIDGE_WIRE", value_enum, default_value_t = Wire::Zmtp)]
    pub wire: Wire,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Endpoint host.
    #[arg(long, env = "MTBRIDGE_HOST", default_value = CLIENT_HOST)]
    pub host: String,
    /// Endpoint port.
    #[arg(long, env = "MTBRIDGE_PORT", default_value_t = mtbridge_transport::DEFAULT_PORT)]
    pub port: u16,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Message framing.
    #[arg(long, env = "MTBRIDGE_WIRE", value_enum, default_value_t = Wire::Zmtp)]
    pub wire: Wire,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        std::time::Duration::from_millis(value)
    } else {
        std::time::Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn wire_choice_selects_protocol() {
        assert_eq!(WireProtocol::from(Wire::default()), WireProtocol::Zmtp);
        assert_eq!(WireProtocol::from(Wire::Native), WireProtocol::Native);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }
}
