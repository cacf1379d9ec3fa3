use framebench::{
    BridgeError, BridgeRequest, Configuration, ErrorCode, ProcessingService, ProcessorBridge,
    ProcessorError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;

const USAGE: &str = "usage:
  framebench process <image> [--gpu] [--output <edges.png>] [--config <file>]
  framebench benchmark <image> <iterations> [--config <file>]";

struct Command {
    request: BridgeRequest,
    config_path: Option<PathBuf>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, ProcessorError> {
    let usage = |reason: &str| ProcessorError::InvalidArgument(format!("{}\n{}", reason, USAGE));

    let subcommand = args.next().ok_or_else(|| usage("missing command"))?;
    let image_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| usage("missing image path"))?;

    let mut use_gpu = false;
    let mut output_path = None;
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gpu" => use_gpu = true,
            "--output" => {
                output_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| usage("--output needs a path"))?,
                ))
            }
            "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| usage("--config needs a path"))?,
                ))
            }
            other if other.starts_with("--") => {
                return Err(usage(&format!("unknown option {}", other)));
            }
            _ => positional.push(arg),
        }
    }

    let request = match subcommand.as_str() {
        "process" => {
            if let Some(extra) = positional.first() {
                return Err(usage(&format!("unexpected argument '{}'", extra)));
            }
            let request = BridgeRequest::process_image(image_path, use_gpu);
            match output_path {
                Some(output_path) => request.with_output(output_path),
                None => request,
            }
        }
        "benchmark" => {
            if use_gpu || output_path.is_some() {
                return Err(usage("--gpu and --output only apply to process"));
            }
            let iterations = match positional.as_slice() {
                [iterations] => iterations,
                [] => return Err(usage("missing iteration count")),
                [_, extra, ..] => {
                    return Err(usage(&format!("unexpected argument '{}'", extra)))
                }
            };
            let iterations = iterations
                .parse::<i64>()
                .map_err(|_| usage(&format!("invalid iteration count '{}'", iterations)))?;
            BridgeRequest::benchmark(image_path, iterations)
        }
        other => return Err(usage(&format!("unknown command '{}'", other))),
    };

    Ok(Command {
        request,
        config_path,
    })
}

async fn run(command: Command) -> Result<String, BridgeError> {
    let operation = command.request.operation();
    let setup_error = |e: ProcessorError| BridgeError::from_processor(operation, &e);

    let configuration = Configuration::load(command.config_path.as_deref()).map_err(setup_error)?;
    tracing::debug!("Using {:#?}", configuration);

    let service = ProcessingService::builder(configuration)
        .build()
        .map_err(setup_error)?;
    service.initialize().map_err(setup_error)?;

    let mut bridge = ProcessorBridge::new(Arc::new(service));
    let response = bridge.call(command.request).await?;
    tracing::info!("{}", response.result());

    let json = response
        .to_json()
        .and_then(|value| serde_json::to_string_pretty(&value))
        .map_err(|e| BridgeError::new(operation.failure_code(), e.to_string()))?;
    Ok(json)
}

fn print_error(error: &BridgeError) {
    match serde_json::to_string_pretty(error) {
        Ok(json) => println!("{}", json),
        Err(_) => eprintln!("{}", error),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            print_error(&BridgeError::new(ErrorCode::InvalidArgument, e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    match run(command).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}
