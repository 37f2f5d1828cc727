use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

mod server;
mod steps;

use plugforge::contexts::{
    prompt_fingerprint, BuildMode, GenerationOutcome, GenerationRequest, MavenRunner,
    OpenAiChatClient, RequestError,
};
use plugforge::data::SanitizationPolicy;
use server::ServiceState;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Runs the HTTP generation service.
pub async fn serve(bind: &str, out_dir: PathBuf, config: &Config) -> Result<()> {
    if config.dry_run {
        println!("[DRY RUN] Would serve the generation endpoint on {}", bind);
        return Ok(());
    }

    server::serve(
        bind,
        ServiceState {
            policy: SanitizationPolicy::default(),
            out_root: out_dir,
            verbose: config.verbose,
        },
    )
    .await
}

/// One-shot generation from the command line.
pub async fn generate(prompt_words: Vec<String>, out_dir: PathBuf, config: &Config) -> Result<()> {
    let prompt = prompt_words.join(" ").trim().to_string();
    if prompt.is_empty() {
        anyhow::bail!("Prompt must not be empty");
    }

    if config.dry_run {
        println!("[DRY RUN] Would generate plugin files for: {}", prompt);
        return Ok(());
    }

    let fingerprint = prompt_fingerprint(&prompt);
    if config.verbose {
        println!("[{}] analyzing prompt ({} chars)", fingerprint, prompt.len());
    }

    let outcome = run_generation(prompt, out_dir).await?;

    steps::print_file_tree(&outcome.files);
    for warning in &outcome.decode_warnings {
        eprintln!(
            "⚠ Could not decode binary payload of '{}': {}",
            warning.path, warning.detail
        );
    }
    for path in &outcome.stubbed_paths {
        println!("⊚ Replaced '{}' with a stub class", path);
    }
    steps::print_summary(&outcome.steps, outcome.files.len());
    println!("✓ Plugin files generated and saved successfully");

    Ok(())
}

/// The pipeline is blocking by design; keep it off the async executor.
async fn run_generation(prompt: String, out_dir: PathBuf) -> Result<GenerationOutcome> {
    let task = tokio::task::spawn_blocking(move || -> Result<_, RequestError> {
        let client = OpenAiChatClient::from_env().map_err(RequestError::Metadata)?;
        GenerationRequest::new(prompt, out_dir, SanitizationPolicy::default(), client).run()
    });

    task.await
        .context("generation task failed")?
        .map_err(|e| anyhow!("{}", e))
}

/// Verifies a generated plugin project with Maven.
pub async fn verify(dir: PathBuf, compile_only: bool, config: &Config) -> Result<()> {
    let mode = if compile_only {
        BuildMode::CompileOnly
    } else {
        BuildMode::Test
    };

    if config.dry_run {
        println!(
            "[DRY RUN] Would run: mvn clean {} -q in {}",
            mode.goal(),
            dir.display()
        );
        return Ok(());
    }

    println!(
        "Verifying plugin project with mvn clean {} -q...",
        mode.goal()
    );

    let report = MavenRunner::new(dir).run(mode).await;

    if config.verbose || !report.success {
        print!("{}", report.stdout);
        eprint!("{}", report.stderr);
    }
    if let Some(line) = &report.error_line {
        eprintln!("First error: {}", line);
    }
    if let Some(reports_dir) = &report.reports_dir {
        println!("Detailed reports: {}", reports_dir);
    }

    if report.success {
        println!("✓ Build verification passed");
        Ok(())
    } else if report.timed_out {
        anyhow::bail!(
            "Build verification timed out after {} seconds",
            mode.timeout().as_secs()
        );
    } else {
        anyhow::bail!(
            "Build verification failed (return code {})",
            report
                .return_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }
}
