use mtbridge_endpoint::RequestSocket;
use mtbridge_exchange::{decode_message, encode_message, ExchangeBuffer};
use mtbridge_frame::FrameConfig;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{endpoint_error, exchange_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        protocol: args.wire.into(),
        ..FrameConfig::default()
    };
    let mut socket = RequestSocket::connect_with_config(&args.host, args.port, config)
        .map_err(|err| endpoint_error("connect failed", err))?;

    let reply = socket
        .request(&payload)
        .map_err(|err| endpoint_error("request failed", err))?;
    let buffer = decode_message(&reply).map_err(|err| exchange_error("reply decode failed", err))?;

    let endpoint = format!("{}:{}", args.host, args.port);
    print_reply(&endpoint, &reply, &buffer, format);
    Ok(SUCCESS)
}

/// Build the wire message from `--json` or from the array flags.
fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        let value = serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        let wire = rmp_serde::to_vec(&value)
            .map_err(|err| CliError::new(USAGE, format!("--json cannot be encoded: {err}")))?;
        decode_message(&wire).map_err(|err| CliError::new(USAGE, format!("--json: {err}")))?;
        return Ok(wire);
    }

    let buffer = ExchangeBuffer::from_parts(
        args.ints.clone().unwrap_or_default(),
        args.reals.clone().unwrap_or_default(),
        args.texts.clone().unwrap_or_default(),
    );
    encode_message(&buffer).map_err(|err| exchange_error("encode failed", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            host: "127.0.0.1".to_string(),
            port: 8000,
            ints: None,
            reals: None,
            texts: None,
            json: None,
            timeout: "5s".to_string(),
            wire: crate::cmd::Wire::Zmtp,
        }
    }

    #[test]
    fn array_flags_encode_non_empty_members() {
        let mut args = args();
        args.ints = Some(vec![1, 2, 3]);
        let wire = resolve_payload(&args).unwrap();
        assert_eq!(wire, rmp_serde::to_vec(&(vec![1i64, 2, 3],)).unwrap());
    }

    #[test]
    fn json_is_sent_as_msgpack() {
        let mut args = args();
        args.json = Some(r#"[[600,1],[1.5,2.5],["ok"]]"#.to_string());
        let wire = resolve_payload(&args).unwrap();

        let buffer = decode_message(&wire).unwrap();
        assert_eq!(buffer.ints(), [600, 1]);
        assert_eq!(buffer.reals(), [1.5, 2.5]);
        assert_eq!(buffer.texts(), ["ok".to_string()]);
    }

    #[test]
    fn json_with_wrong_shape_is_usage_error() {
        let mut args = args();
        args.json = Some(r#"{"ints":[1]}"#.to_string());
        assert_eq!(resolve_payload(&args).unwrap_err().code, USAGE);

        args.json = Some("[1, 2".to_string());
        assert_eq!(resolve_payload(&args).unwrap_err().code, USAGE);
    }

    #[test]
    fn no_flags_send_empty_message() {
        assert_eq!(resolve_payload(&args()).unwrap(), [0x90]);
    }
}
