use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "plugforge")]
#[command(about = "An LLM-assisted generator for Mirth Connect plugin projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Perform a dry run without executing actions")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP generation service")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000", help = "Address to bind")]
        bind: String,

        #[arg(long, default_value = ".", help = "Directory generated files are written under")]
        out_dir: PathBuf,
    },

    #[command(about = "Generate plugin files from a prompt")]
    Generate {
        #[arg(help = "Plugin description prompt", required = true)]
        prompt: Vec<String>,

        #[arg(long, default_value = ".", help = "Directory generated files are written under")]
        out_dir: PathBuf,
    },

    #[command(about = "Verify a generated plugin project with Maven")]
    Verify {
        #[arg(help = "Plugin project directory containing pom.xml")]
        dir: PathBuf,

        #[arg(long, help = "Run the compile phase only instead of tests")]
        compile_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Serve { bind, out_dir } => {
            cli::serve(&bind, out_dir, &config).await?;
        }
        Commands::Generate { prompt, out_dir } => {
            cli::generate(prompt, out_dir, &config).await?;
        }
        Commands::Verify { dir, compile_only } => {
            cli::verify(dir, compile_only, &config).await?;
        }
    }

    Ok(())
}
