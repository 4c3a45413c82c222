use std::process::ExitCode;

use common::log_setup::setup_logging;
use edgedetect::prelude::*;

fn main() -> ExitCode {
    let options = match parse_args(std::env::args_os().skip(1)) {
        Command::Help => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Invalid(_) => {
            println!("{}", INVALID_ARGUMENT);
            return ExitCode::SUCCESS;
        }
        Command::Run(options) => options,
    };

    let log_config = LogConfig::from_env();
    if let Err(e) = setup_logging(&log_config.level, "edgedetect", log_config.dir.as_deref()) {
        eprintln!("Failed to set up logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    let config = match RunConfig::from_env(options) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &RunConfig) -> Result<()> {
    let context = AcceleratorContext::new(config.backend)?;
    let pipeline = Pipeline::new(&context, config.request, config.timing);

    if config.is_list() {
        let report = run_list(&pipeline, &config.input, config.output.as_deref())?;
        if report.failed() > 0 {
            tracing::warn!(
                "{} of {} images failed",
                report.failed(),
                report.succeeded() + report.failed()
            );
        }
    } else {
        pipeline.process_image(&config.input, config.output.as_deref())?;
    }

    Ok(())
}
