use anyhow::{anyhow, Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use plugforge::contexts::{
    prompt_fingerprint, GenerationRequest, OpenAiChatClient, RequestError,
};
use plugforge::data::SanitizationPolicy;
use plugforge::storage::WrittenFile;

/// Shared read-only state of the generation service.
pub struct ServiceState {
    pub policy: SanitizationPolicy,
    pub out_root: PathBuf,
    pub verbose: bool,
}

#[derive(Deserialize)]
struct GenerateRequestBody {
    prompt: String,
}

#[derive(Serialize)]
struct GenerateResponseBody {
    msg: String,
    steps: Vec<String>,
    files: Vec<WrittenFile>,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: String,
}

/// Runs the HTTP generation service until the process is stopped.
pub async fn serve(bind: &str, state: ServiceState) -> Result<()> {
    // Fail fast on missing credentials instead of per request.
    OpenAiChatClient::env_is_configured().map_err(|e| anyhow!("{}", e))?;

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", bind))?;
    let shared = Arc::new(state);

    let make_service = make_service_fn(move |_| {
        let shared = Arc::clone(&shared);
        async move {
            Ok::<_, Infallible>(service_fn(move |request: Request<Body>| {
                let shared = Arc::clone(&shared);
                async move { Ok::<_, Infallible>(handle(request, shared).await) }
            }))
        }
    });

    println!("Listening on http://{}", addr);

    Server::try_bind(&addr)
        .map_err(|e| anyhow!("failed to bind generation service on {}: {}", addr, e))?
        .serve(make_service)
        .await
        .context("generation service terminated")?;

    Ok(())
}

async fn handle(request: Request<Body>, state: Arc<ServiceState>) -> Response<Body> {
    match (request.method(), request.uri().path()) {
        (&Method::POST, "/generate") => generate(request, state).await,
        (_, "/generate") => error_response(StatusCode::METHOD_NOT_ALLOWED, "only POST is supported"),
        _ => error_response(StatusCode::NOT_FOUND, "unknown route"),
    }
}

async fn generate(request: Request<Body>, state: Arc<ServiceState>) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(request.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("failed to read request body: {}", e),
            );
        }
    };

    let body: GenerateRequestBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("request body is not valid JSON: {}", e),
            );
        }
    };

    let prompt = body.prompt.trim().to_string();
    if prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "prompt must not be empty");
    }

    let fingerprint = prompt_fingerprint(&prompt);
    println!("[{}] prompt received ({} chars)", fingerprint, prompt.len());

    let policy = state.policy.clone();
    let out_root = state.out_root.clone();
    let task = tokio::task::spawn_blocking(move || -> Result<_, RequestError> {
        let client = OpenAiChatClient::from_env().map_err(RequestError::Metadata)?;
        GenerationRequest::new(prompt, out_root, policy, client).run()
    });

    let outcome = match task.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            eprintln!("✗ [{}] {}", fingerprint, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
        Err(e) => {
            eprintln!("✗ [{}] generation task panicked: {}", fingerprint, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "generation task failed");
        }
    };

    for warning in &outcome.decode_warnings {
        eprintln!(
            "⚠ [{}] could not decode binary payload of '{}': {}",
            fingerprint, warning.path, warning.detail
        );
    }
    for path in &outcome.stubbed_paths {
        println!("⊚ [{}] replaced '{}' with a stub class", fingerprint, path);
    }
    if state.verbose {
        for step in &outcome.steps {
            println!("[{}] {}", fingerprint, step);
        }
    }
    println!(
        "✓ [{}] {} file(s) written",
        fingerprint,
        outcome.files.len()
    );

    json_response(
        StatusCode::OK,
        &GenerateResponseBody {
            msg: "Plugin files generated and saved successfully.".to_string(),
            steps: outcome.steps,
            files: outcome.files,
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let payload = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(payload))
        .expect("valid HTTP response")
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(
        status,
        &ErrorResponseBody {
            error: message.to_string(),
        },
    )
}
