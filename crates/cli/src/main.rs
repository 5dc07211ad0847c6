//! pyfunc CLI
//!
//! Reference host for the function bridge: runs scripts of `python`,
//! `variable` and `print` commands against the embedded interpreter.

mod script;

use clap::{Parser as ClapParser, Subcommand};
use pyfunc_runtime::BridgeConfig;
use script::Script;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "pyfunc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run host scripts that call into embedded Python", long_about = None)]
struct Cli {
    /// Log bridge activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a host script
    Run {
        /// Script file
        script: PathBuf,

        /// Bridge configuration (TOML); defaults to PYFUNC_* environment variables
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show build and configuration details
    Info {
        /// Bridge configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { script, config } => {
            let config = load_config(config.as_deref());
            run_script(&script, config);
        }
        Commands::Info { config } => {
            let config = load_config(config.as_deref());
            print_info(&config);
        }
    }
}

/// `PYFUNC_LOG` takes precedence over `-v`
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PYFUNC_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> BridgeConfig {
    match path {
        Some(path) => match BridgeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => BridgeConfig::from_env(),
    }
}

fn run_script(path: &Path, config: BridgeConfig) {
    info!(script = %path.display(), "running");
    let mut script = Script::new(config, io::stdout().lock());
    if let Err(e) = script.run_file(path) {
        eprintln!("{}: {}", path.display(), e);
        // Tear the interpreter down before exiting
        drop(script);
        process::exit(e.exit_code());
    }
}

fn print_info(config: &BridgeConfig) {
    println!("pyfunc {}", env!("CARGO_PKG_VERSION"));
    println!(
        "python support: {}",
        if cfg!(feature = "python") {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("result capacity: {}", config.result_capacity);
    println!("main module: {}", config.main_module);
    println!("unbuffered: {}", config.unbuffered);
}
