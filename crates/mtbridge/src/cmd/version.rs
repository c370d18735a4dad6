use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("mtbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: mtbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("MTBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_port: {}", mtbridge_transport::DEFAULT_PORT);
    println!(
        "max_payload_bytes: {}",
        mtbridge_frame::DEFAULT_MAX_PAYLOAD
    );
    println!(
        "features: endpoint={}, cli=true",
        cfg!(feature = "endpoint")
    );

    Ok(SUCCESS)
}
