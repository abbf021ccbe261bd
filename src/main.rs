use std::process::ExitCode;

use clap::Parser;

use uvc_gadget::cli::{Args, Settings};

fn main() -> ExitCode {
    let args = Args::parse();
    let debug = args.debug;

    let settings = match Settings::from_args(args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("uvc-gadget: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if debug { log::LevelFilter::Debug } else { log::LevelFilter::Info });
    builder.init();

    let mut pipeline = match uvc_gadget::build(&settings) {
        Ok(p) => p,
        Err(e) => {
            log::error!("failed to initialize: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("daemon exited with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
