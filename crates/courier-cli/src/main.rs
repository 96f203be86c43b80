mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use courier_core::domain::{EngineConfig, RequestDescriptor, TransportError};
use courier_core::http::Method;
use courier_core::impls::{ReqwestTransport, ScriptedTransport, Step};
use courier_core::ports::Transport;
use courier_core::{EngineBuilder, EngineError, Response};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse {}: {e}", path.display()))
}

/// Demo transport: refuse, time out, answer 503, then answer 200.
fn flaky_transport() -> ScriptedTransport {
    ScriptedTransport::new([
        Step::fail(TransportError::connect("connection refused")),
        Step::fail(TransportError::timeout("read timed out")),
        Step::reply(503, "busy"),
    ])
    .then_always(Step::reply(200, r#"{"message":"hello from courier"}"#))
}

fn report(result: Result<Response, EngineError>) -> ExitCode {
    match result {
        Ok(response) => {
            println!(
                "status={} attempt={} elapsed={}ms",
                response.status_code(),
                response.attempt(),
                response.elapsed().as_millis()
            );
            match response.text() {
                Ok(text) => println!("{text}"),
                Err(e) => println!("(body unreadable: {e})"),
            }
            if let Some(cause) = response.cause() {
                println!("delivered with error status: {cause}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("request failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (transport, url): (Arc<dyn Transport>, String) = match args.url {
        Some(url) => (Arc::new(ReqwestTransport::new().with_runtime(runtime.handle().clone())), url),
        None => {
            // the demo needs retries to get through the scripted failures
            config.retry_count = config.retry_count.max(3);
            (Arc::new(flaky_transport()), "http://demo.invalid/hello".to_string())
        }
    };
    if let Some(retries) = args.retries {
        config.retry_count = retries;
    }

    let engine = EngineBuilder::new(transport)
        .config(config)
        .runtime(runtime.handle().clone())
        .build();

    let mut request = engine
        .request(Method::GET, url)
        .header("Accept", "application/json")
        .async_mode(args.async_mode);
    if let Some(step) = args.progress_step {
        request = request.progress_step(step).on_progress(|p| {
            tracing::info!(
                bytes = p.current_bytes,
                total = ?p.total_bytes,
                done = p.done,
                "download progress"
            );
        });
    }
    let descriptor: RequestDescriptor = match request.build() {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let execution = engine.send(descriptor);
    if execution.is_async() {
        report(runtime.block_on(execution.join()))
    } else {
        report(execution.wait())
    }
}
