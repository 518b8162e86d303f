//! Analyst Bot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the LLM provider and open the artifact store
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run comms channels until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use analyst_bot::agents::{AgentsState, CommunicationAgent};
use analyst_bot::config::{self, Config};
use analyst_bot::error::AppError;
use analyst_bot::llm::providers;
use analyst_bot::storage::ArtifactStore;
use analyst_bot::{comms, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;

    // The console only makes sense with a terminal attached.
    if !args.interactive {
        config.comms.pty.enabled = false;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
    let store = ArtifactStore::open(&config.work_dir)?;
    let agents = Arc::new(AgentsState::new(&config, llm, store));
    info!(provider = agents.provider_name(), store = %agents.store.root().display(), "agents ready");

    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, agents.provider_name(), args.interactive);

    let handle = comms::start(&config, CommunicationAgent::new(agents), shutdown.clone());
    let result = handle.join().await;

    // Console EOF ends comms without Ctrl-C.
    shutdown.cancel();

    if args.interactive {
        use std::io::Write as _;
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }

    result
}

fn print_startup_summary(config: &Config, provider: &str, interactive: bool) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        if text.chars().count() >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let pty = if config.comms_pty_should_load() { "enabled" } else { "disabled" };
    let http = if config.comms_http_should_load() {
        config.comms.http.bind.clone()
    } else {
        "disabled".to_string()
    };
    let llm_line = if provider == "dummy" {
        "provider=dummy (echo, no API calls)".to_string()
    } else {
        format!(
            "provider={} model={} timeout={}s",
            provider, config.llm.openai.model, config.llm.openai.timeout_seconds
        )
    };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {}   ║", fit(format!("📊 {} status", config.bot_name)));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("work dir: {}", config.work_dir.display())));
    println!("║   {}║", fit(format!("pid: {}", std::process::id())));
    println!("║   {}║", fit(format!("console: {pty}")));
    println!("║   {}║", fit(format!("http: {http}")));
    println!("║   {}║", fit(llm_line));
    println!("╚══════════════════════════════════════════════════════════════╝");

    if interactive {
        println!("💡 Type /help for help");
    }
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: analyst-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Enable the console channel");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
