//! # CodeCompass CLI (`codecompass`)
//!
//! Runs the chat relay and a few tools around it.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codecompass serve` | Start the chat relay HTTP server |
//! | `codecompass transcode` | Transcode captured upstream bytes to SSE frames |
//! | `codecompass chat "<query>"` | Stream an answer from a running relay |
//! | `codecompass check` | Validate the configuration file |
//! | `codecompass completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! codecompass serve --config ./config/codecompass.toml
//! codecompass transcode --input captured.bin --carry --chunk-size 64
//! CODECOMPASS_TOKEN=dev-token codecompass chat "Where is the router defined?"
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use codecompass::chat_cmd::{self, TOKEN_ENV};
use codecompass::config::{self, Config};
use codecompass::logging;
use codecompass::server;
use codecompass::transcode_cmd::{self, DEFAULT_CHUNK_SIZE};
use codecompass_core::BoundaryPolicy;

/// CodeCompass chat relay.
#[derive(Parser)]
#[command(
    name = "codecompass",
    about = "CodeCompass chat relay: streams AI backend answers to browsers as Server-Sent Events",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/codecompass.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat relay HTTP server.
    Serve,

    /// Transcode captured upstream bytes into client SSE frames.
    ///
    /// Reads a raw backend response body and prints the frames the relay
    /// would send. Uses the config's transcoder settings when the config
    /// file exists, defaults otherwise.
    Transcode {
        /// Input file (defaults to stdin).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Carry documents split across reads instead of dropping them.
        #[arg(long)]
        carry: bool,

        /// Bytes per read, to simulate transport chunking.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Ask a running relay a question and print the streamed answer.
    Chat {
        /// The question.
        query: String,

        /// Relay endpoint (defaults to `/api/chat` on `[server].bind`).
        #[arg(long)]
        url: Option<String>,

        /// Session token (defaults to $CODECOMPASS_TOKEN).
        #[arg(long)]
        token: Option<String>,
    },

    /// Load and validate the configuration, then print the resolved settings.
    Check,

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Transcode {
            input,
            carry,
            chunk_size,
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            let mut options = cfg.transcoder.options();
            if carry {
                options.policy = BoundaryPolicy::Carry;
            }
            transcode_cmd::run_transcode(input.as_deref(), options, chunk_size).await?;
        }
        Commands::Chat { query, url, token } => {
            let url = match url {
                Some(url) => url,
                None => {
                    let cfg =
                        config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
                    format!("http://{}/api/chat", cfg.server.bind)
                }
            };
            let token = token.or_else(|| std::env::var(TOKEN_ENV).ok());
            chat_cmd::run_chat(&url, token.as_deref(), &query).await?;
        }
        Commands::Check => {
            let cfg = config::load_config(&cli.config)?;
            println!("config: {}", cli.config.display());
            println!("  server.bind:          {}", cfg.server.bind);
            println!("  server.cors:          {}", cfg.server.cors);
            println!("  backend.url:          {}", cfg.backend.url);
            println!("  backend.idle_timeout: {}s", cfg.backend.idle_timeout_secs);
            println!("  transcoder.boundary:  {:?}", cfg.transcoder.boundary);
            println!("  auth.tokens:          {}", cfg.auth.tokens.len());
            println!("ok");
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        }
    }

    Ok(())
}
