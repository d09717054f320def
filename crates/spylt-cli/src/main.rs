//! Spylt entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use spylt_cli::commands::{self, BuildOptions};
use spylt_cli::config::{resolve_bundler, resolve_component};

#[derive(Parser)]
#[command(
    name = "spylt",
    about = "Spylt: a Python and Svelte framework which converts Python to API routes and Svelte to pre-rendered HTML",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Spylt project.
    New {
        /// Directory to create the project in.
        directory: PathBuf,

        /// Skip checking for npm and installing the bundler toolchain.
        #[arg(long)]
        no_install: bool,
    },

    /// Compile the backend module and the Svelte code.
    Build {
        /// Path to output compiled HTML.
        #[arg(long, default_value = "index.html")]
        html: PathBuf,

        /// Path to output compiled Python API.
        #[arg(long, default_value = "main.py")]
        py: PathBuf,

        /// Root Svelte component. Also reads SPYLT_COMPONENT.
        #[arg(long)]
        component: Option<String>,

        /// Bundler command line; `{out}` is the script output path.
        /// Also reads SPYLT_BUNDLER.
        #[arg(long)]
        bundler: Option<String>,

        /// Seconds the bundler may run. Also reads SPYLT_BUNDLE_TIMEOUT.
        #[arg(long)]
        bundle_timeout: Option<u64>,
    },

    /// Create a JavaScript interface from a Spylt API.
    Interface {
        /// Path to output JavaScript interface.
        #[arg(short, long, default_value = "src/api.js")]
        out: PathBuf,

        /// Root Svelte component. Also reads SPYLT_COMPONENT.
        #[arg(long)]
        component: Option<String>,
    },

    /// Print the linker source for the root component.
    Link {
        /// Root Svelte component. Also reads SPYLT_COMPONENT.
        #[arg(long)]
        component: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   spylt completions bash > ~/.local/share/bash-completion/completions/spylt
    ///   spylt completions zsh > ~/.zfunc/_spylt
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::New {
            directory,
            no_install,
        } => commands::new_project(&directory, !no_install).await,

        Commands::Build {
            html,
            py,
            component,
            bundler,
            bundle_timeout,
        } => {
            let root = std::env::current_dir()?;
            let options = BuildOptions {
                component: resolve_component(component.as_deref()),
                html,
                py,
                bundler: resolve_bundler(bundler.as_deref(), bundle_timeout)?,
            };
            commands::build(&root, &options).await
        }

        Commands::Interface { out, component } => {
            let root = std::env::current_dir()?;
            commands::write_interface(&root, &resolve_component(component.as_deref()), &out)?;
            Ok(())
        }

        Commands::Link { component } => {
            let root = std::env::current_dir()?;
            let linker = commands::link(&root, &resolve_component(component.as_deref()))?;
            println!("{linker}");
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "spylt", &mut std::io::stdout());
            Ok(())
        }
    }
}
