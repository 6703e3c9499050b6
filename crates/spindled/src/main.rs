use std::process::ExitCode;
use std::sync::Arc;

use spindled::{
    CallbackRender, JsonResponse, Request, Response, StopToken, StructuredServerReporter,
    SystemConfigLoader, bootstrap_with,
};

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredServerReporter::new());
    // The reporter has already logged the failure.
    let Ok(bootstrapped) = bootstrap_with(&SystemConfigLoader, reporter) else {
        return ExitCode::FAILURE;
    };

    let server = bootstrapped
        .into_server(env!("CARGO_PKG_NAME"))
        .with_render(CallbackRender::new("echo", echo));
    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "spindled::main", error = %error, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

/// Echoes the request back in the shape it arrived in.
fn echo(
    request: &Request,
    _response: Option<&mut Response>,
    _stop: &StopToken,
) -> Option<Response> {
    match request {
        Request::PlainText(plain) => Some(Response::text(plain.text())),
        Request::Shell(shell) => Some(Response::text(shell.to_string())),
        Request::Serialized(serialized) => {
            let mut json = JsonResponse::new();
            json.insert("command", serialized.command());
            json.insert("arguments", serialized.arguments_json());
            Some(json.into())
        }
    }
}
