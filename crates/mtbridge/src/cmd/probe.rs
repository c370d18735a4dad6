use std::time::Instant;

use mtbridge_endpoint::RequestSocket;
use mtbridge_frame::FrameConfig;

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{print_probe, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        protocol: args.wire.into(),
        ..FrameConfig::default()
    };

    let mut socket = RequestSocket::connect_with_config(&args.host, args.port, config)
        .map_err(|err| endpoint_error("connect failed", err))?;

    let started = Instant::now();
    socket
        .probe()
        .map_err(|err| endpoint_error("probe failed", err))?;

    let endpoint = format!("{}:{}", args.host, args.port);
    print_probe(&endpoint, started.elapsed(), format);
    Ok(SUCCESS)
}
