//! CLI parser and command implementations.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;

use super::progress::{progress_println, spawn_renderer};
use crate::browser::binary::INSTALL_HINT;
use crate::browser::{find_chrome, ChromiumLauncher};
use crate::config::{resolve_from_cwd, Config};
use crate::driver::{Acquisition, SessionDriver};
use crate::error::AcquireError;
use crate::sink::Reporter;

#[derive(Parser)]
#[command(name = "vidacquire")]
#[command(about = "Locate and download the primary video on a web page")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "VIDACQUIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to save videos into (overrides config)
    #[arg(long, global = true)]
    save_dir: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headed: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download the video behind the first link in TEXT
    Grab {
        /// Share text or link (joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Prompt for links until told to quit (default)
    Repl,

    /// Check for a usable browser and show the effective configuration
    Check,
}

/// Words that leave the prompt loop.
const QUIT_WORDS: &[&str] = &["q", "quit", "exit"];

fn is_quit(input: &str) -> bool {
    QUIT_WORDS
        .iter()
        .any(|w| input.eq_ignore_ascii_case(w))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Grab { text } => cmd_grab(config, &text.join(" ")).await,
        Commands::Repl => cmd_repl(config).await,
        Commands::Check => cmd_check(&config),
    }
}

async fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::load_from_path(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env_overrides(),
        None => Config::load().await,
    };

    if let Some(ref dir) = cli.save_dir {
        config.save_dir = resolve_from_cwd(dir);
    }
    if cli.headed {
        config.browser.headless = false;
    }
    Ok(config)
}

/// Reporter that styles lines for the terminal.
fn terminal_reporter() -> Reporter {
    Reporter::new(Arc::new(|line: &str| {
        let rendered = match line.strip_prefix("Error: ") {
            Some(error) => format!("{} {}", style("✗").red(), style(error).red()),
            None => format!("{} {}", style("→").dim(), line),
        };
        progress_println(&rendered);
    }))
}

/// Ctrl-C cancels the running transfer; outside a run it exits.
struct Interrupts {
    cancel: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl Interrupts {
    fn install() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let cancel = Arc::new(tx);
        let running = Arc::new(AtomicBool::new(false));

        let handler_cancel = cancel.clone();
        let handler_running = running.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if handler_running.load(Ordering::SeqCst) {
                    progress_println(&format!("{} Cancelling...", style("!").yellow()));
                    let _ = handler_cancel.send(true);
                } else {
                    std::process::exit(130);
                }
            }
        });

        (Self { cancel, running }, rx)
    }

    fn begin(&self) {
        self.cancel.send_replace(false);
        self.running.store(true, Ordering::SeqCst);
    }

    fn end(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn build_driver(config: Config) -> (SessionDriver, Interrupts) {
    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let (interrupts, cancel) = Interrupts::install();
    let driver = SessionDriver::new(config, launcher)
        .with_reporter(terminal_reporter())
        .with_cancel(cancel);
    (driver, interrupts)
}

/// One run with a progress bar attached.
async fn grab_once(
    driver: &mut SessionDriver,
    interrupts: &Interrupts,
    text: &str,
) -> Result<Acquisition, AcquireError> {
    let (tx, renderer) = spawn_renderer("Downloading");
    driver.set_progress(tx);

    interrupts.begin();
    let result = driver.acquire(text).await;
    interrupts.end();

    // The driver drops the sender when the run ends
    let _ = renderer.await;
    result
}

async fn cmd_grab(config: Config, text: &str) -> anyhow::Result<()> {
    let (mut driver, interrupts) = build_driver(config);
    match grab_once(&mut driver, &interrupts, text).await {
        Ok(acquisition) => {
            println!(
                "{} {}",
                style("✓").green(),
                acquisition.target.destination_path.display()
            );
            Ok(())
        }
        // Already reported through the sink
        Err(_) => std::process::exit(1),
    }
}

async fn cmd_repl(config: Config) -> anyhow::Result<()> {
    let save_dir = config.save_dir();
    let (mut driver, interrupts) = build_driver(config);

    println!(
        "{} Paste a share link or text containing one. Videos are saved to {}",
        style("vidacquire").cyan().bold(),
        style(save_dir.display()).dim()
    );
    println!("  Type {} to quit.", style("q").bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout
            .write_all(format!("\n{} ", style(">").cyan()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_quit(input) {
            break;
        }

        if let Ok(acquisition) = grab_once(&mut driver, &interrupts, input).await {
            println!(
                "{} {}",
                style("✓").green(),
                acquisition.target.destination_path.display()
            );
        }
    }

    println!("Bye.");
    Ok(())
}

fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("{}", style("Browser").bold());
    match find_chrome(config.browser.chrome_path.as_deref()) {
        Some(path) => println!("  {} {}", style("✓").green(), path.display()),
        None => {
            println!("  {} No usable Chrome/Chromium", style("✗").red());
            for line in INSTALL_HINT.lines() {
                println!("    {}", line.trim());
            }
        }
    }
    if !cfg!(feature = "browser") {
        println!(
            "  {} Built without the browser feature; runs will fail to launch",
            style("!").yellow()
        );
    }

    println!("\n{}", style("Configuration").bold());
    match config.source_path {
        Some(ref path) => println!("  {} Source: {}", style("→").dim(), path.display()),
        None => {
            let hint = dirs::config_dir()
                .map(|d| d.join("vidacquire").display().to_string())
                .unwrap_or_else(|| "~/.config/vidacquire".to_string());
            println!(
                "  {} Source: defaults (no config file found, searched {} and the working directory)",
                style("→").dim(),
                hint
            );
        }
    }

    let save_dir = config.save_dir();
    let save_state = if save_dir.is_dir() {
        "exists"
    } else {
        "created on first download"
    };
    print_setting("save_dir", &format!("{} ({})", save_dir.display(), save_state));
    print_setting("browser.headless", &config.browser.headless.to_string());
    print_setting("browser.user_agent", &config.browser.user_agent);
    print_setting(
        "browser.referer",
        config
            .browser
            .referer
            .as_deref()
            .unwrap_or("page origin"),
    );
    print_setting(
        "browser.viewport",
        &format!(
            "{}x{}",
            config.browser.viewport_width, config.browser.viewport_height
        ),
    );
    if let Some(ref script) = config.browser.stealth_script {
        let state = if script.is_file() { "found" } else { "missing" };
        print_setting(
            "browser.stealth_script",
            &format!("{} ({})", script.display(), state),
        );
    }
    if let Some(ref proxy) = config.browser.proxy {
        print_setting("browser.proxy", proxy);
    }

    let detection = &config.detection;
    print_setting(
        "detection.min_candidate_bytes",
        &detection.min_candidate_bytes.to_string(),
    );
    print_setting(
        "detection.navigation_timeout_secs",
        &detection.navigation_timeout_secs.to_string(),
    );
    print_setting(
        "detection.media_wait_timeout_secs",
        &detection.media_wait_timeout_secs.to_string(),
    );
    print_setting(
        "detection.settle_delay_ms",
        &detection.settle_delay_ms.to_string(),
    );
    print_setting("detection.media_selector", &detection.media_selector);
    print_setting(
        "detection.title_max_chars",
        &detection.title_max_chars.to_string(),
    );
    print_setting(
        "download.chunk_size",
        &config.download.chunk_size.to_string(),
    );

    Ok(())
}

fn print_setting(setting: &str, value: &str) {
    println!("  {} {}: {}", style("→").dim(), setting, value);
}
