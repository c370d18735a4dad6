use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mtbridge_endpoint::{Endpoint, EndpointConfig, EndpointError, Received, Target};
use mtbridge_frame::FrameConfig;

use crate::cmd::ServeArgs;
use crate::exit::{endpoint_error, exchange_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

/// Exit code after a second Ctrl-C while blocked waiting for a request.
const INTERRUPTED: i32 = 130;

enum ReceiveDisposition {
    /// Reply to the request with this buffer.
    Reply(Target),
    /// Nothing owed: a probe already answered or a dropped connection.
    Skip,
    Fatal(CliError),
}

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let indicators = args
        .indicators
        .iter()
        .map(|raw| parse_indicator(raw))
        .collect::<CliResult<Vec<_>>>()?;

    let frame = FrameConfig {
        protocol: args.wire.into(),
        ..FrameConfig::default()
    };
    let config = EndpointConfig::new(args.port)
        .with_host(args.host.clone())
        .with_frame_config(frame);
    let mut endpoint =
        Endpoint::open_with_config(config).map_err(|err| endpoint_error("bind failed", err))?;

    for (name, symbol, period) in indicators {
        let handle = endpoint
            .state_mut()
            .registry_mut()
            .create(name.as_str(), symbol.as_str(), period)
            .map_err(|err| exchange_error("indicator create failed", err))?;
        tracing::info!(%handle, name = %name, symbol = %symbol, period, "indicator ready");
    }
    tracing::info!(local_addr = %endpoint.local_addr(), "serving");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut answered = 0usize;
    while running.load(Ordering::SeqCst) && args.count.is_none_or(|count| answered < count) {
        let target = match classify(endpoint.receive()) {
            ReceiveDisposition::Reply(target) => target,
            ReceiveDisposition::Skip => continue,
            ReceiveDisposition::Fatal(err) => return Err(err),
        };

        match endpoint.send_reply(target) {
            Ok(()) => {
                answered += 1;
                tracing::info!(%target, answered, "exchange complete");
            }
            Err(EndpointError::TransportClosed(reason)) => {
                tracing::warn!(%reason, "peer left before the reply");
            }
            Err(EndpointError::ConnectionDropped(err)) => {
                tracing::warn!(error = %err, "reply not delivered");
            }
            Err(err) => return Err(endpoint_error("reply failed", err)),
        }
    }

    endpoint.close();
    Ok(SUCCESS)
}

fn classify(result: Result<Received, EndpointError>) -> ReceiveDisposition {
    match result {
        Ok(Received::NoData) => ReceiveDisposition::Skip,
        Ok(Received::Global) => ReceiveDisposition::Reply(Target::Global),
        Ok(Received::Indicator(handle)) => ReceiveDisposition::Reply(Target::Indicator(handle)),
        // The request is still owed a reply; answer with the unchanged global buffer.
        Err(EndpointError::Exchange(err)) => {
            tracing::warn!(error = %err, "request rejected");
            ReceiveDisposition::Reply(Target::Global)
        }
        Err(EndpointError::ConnectionDropped(err)) => {
            tracing::warn!(error = %err, "connection dropped, no reply owed");
            ReceiveDisposition::Skip
        }
        Err(err) => ReceiveDisposition::Fatal(endpoint_error("receive failed", err)),
    }
}

fn parse_indicator(raw: &str) -> CliResult<(String, String, i32)> {
    let invalid = || {
        CliError::new(
            USAGE,
            format!("--indicator must be NAME:SYMBOL:PERIOD, got {raw:?}"),
        )
    };

    let mut parts = raw.splitn(3, ':');
    let (Some(name), Some(symbol), Some(period)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if name.is_empty() {
        return Err(invalid());
    }
    let period = period.parse::<i32>().map_err(|_| invalid())?;
    Ok((name.to_string(), symbol.to_string(), period))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED);
        }
        tracing::info!("stopping after the current exchange (Ctrl-C again to exit now)");
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use mtbridge_endpoint::IndicatorHandle;
    use mtbridge_exchange::ExchangeError;
    use mtbridge_frame::FrameError;

    use super::*;

    #[test]
    fn routed_requests_are_answered_from_their_target() {
        let handle = IndicatorHandle::from_raw(1).unwrap();
        assert!(matches!(
            classify(Ok(Received::Indicator(handle))),
            ReceiveDisposition::Reply(Target::Indicator(h)) if h == handle
        ));
        assert!(matches!(
            classify(Ok(Received::NoData)),
            ReceiveDisposition::Skip
        ));
    }

    #[test]
    fn rejected_request_still_gets_global_reply() {
        let err = EndpointError::Exchange(ExchangeError::InvalidHandle(99));
        assert!(matches!(
            classify(Err(err)),
            ReceiveDisposition::Reply(Target::Global)
        ));
    }

    #[test]
    fn dropped_connections_skip_and_sequence_errors_are_fatal() {
        let dropped = EndpointError::ConnectionDropped(FrameError::InvalidMagic);
        assert!(matches!(classify(Err(dropped)), ReceiveDisposition::Skip));

        let order = EndpointError::OutOfSequence("a reply is owed for the previous request");
        assert!(matches!(classify(Err(order)), ReceiveDisposition::Fatal(_)));
    }

    #[test]
    fn indicator_argument_parsing() {
        assert_eq!(
            parse_indicator("MA:EURUSD:60").unwrap(),
            ("MA".to_string(), "EURUSD".to_string(), 60)
        );
        assert!(parse_indicator("MA:EURUSD").is_err());
        assert!(parse_indicator(":EURUSD:60").is_err());
        assert!(parse_indicator("MA:EURUSD:H1").is_err());
    }
}
