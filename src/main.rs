use std::process::ExitCode;

use clap::{Parser, Subcommand};
use runvm::config::Config;
use runvm::logging;
use runvm::precedence::{DEFAULT_PRECEDENCE, resolve_active, run_active};
use runvm::version::error::ManagerError;
use runvm::version::manager::{InstallStatus, VersionManager};
use runvm::version::runner::ExitOutcome;

/// Store root not configured or unusable
const EXIT_CONFIG: u8 = 40;
/// No active version could be decided
const EXIT_NO_VERSION: u8 = 41;
/// The runtime could not be started
const EXIT_SPAWN: u8 = 42;

#[derive(Parser)]
#[command(name = "runvm")]
#[command(version, about = "Install, select and run runtime builds side by side")]
struct Cli {
    /// Use 64-bit builds (`true`) or 32-bit builds (`false`)
    #[arg(long, global = true)]
    x64: Option<bool>,

    /// Write the log file as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed versions
    List {
        /// Run each build and show the version it reports
        #[arg(long)]
        verify: bool,
    },
    /// List versions available for download
    ListRemote,
    /// Install a version, or every available version with --all
    Install {
        spec: Option<String>,
        #[arg(long, conflicts_with = "spec")]
        all: bool,
    },
    /// Remove an installed version
    Remove { spec: String },
    /// Show or set the global version
    Global { spec: Option<String> },
    /// Show or set the version for the current directory
    Local { spec: Option<String> },
    /// Show the environment override
    Env,
    /// Show the active version and where it comes from
    Current,
    /// Show or set extra arguments for a version
    Args {
        spec: String,
        #[arg(allow_hyphen_values = true)]
        args: Option<String>,
    },
    /// Run a specific version
    Run {
        spec: String,
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run the active version
    Exec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if let Some(x64) = cli.x64 {
        config.want_x64 = x64;
    }

    let _guard = logging::init(&config.log_path(), cli.log_json)
        .inspect_err(|e| eprintln!("warning: logging disabled: {:#}", e))
        .ok();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    ExitCode::from(exit_status_for(err))
}

fn exit_status_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ManagerError>() {
        Some(ManagerError::NoActiveVersion) => EXIT_NO_VERSION,
        Some(ManagerError::Spawn { .. }) => EXIT_SPAWN,
        Some(ManagerError::InvalidConfig(_) | ManagerError::StoreLayout { .. }) => EXIT_CONFIG,
        _ => 1,
    }
}

fn child_exit(outcome: ExitOutcome) -> ExitCode {
    match outcome.code {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<ExitCode> {
    let manager = VersionManager::new(&config)?;

    match command {
        Command::List { verify: false } => {
            for version in manager.list_installed().await? {
                println!("  {}", version);
            }
        }
        Command::List { verify: true } => {
            for version in manager.list_installed().await? {
                match manager.probe_installed(&version).await {
                    Ok(reported) if reported == version => println!("  {}", version),
                    Ok(reported) => println!("  {} (reports {})", version, reported),
                    Err(e) => println!("  {} (broken: {})", version, e),
                }
            }
        }
        Command::ListRemote => {
            for version in manager.list_available().await? {
                println!("  {}", version);
            }
        }
        Command::Install { all: true, .. } => {
            let mut failed = false;
            manager
                .install_all_with(|report| match report.outcome {
                    Ok(InstallStatus::Installed) => println!("installed {}", report.version),
                    Ok(InstallStatus::AlreadyInstalled) => {}
                    Err(e) => {
                        failed = true;
                        eprintln!("{}", e);
                    }
                })
                .await?;
            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Install { spec, all: false } => {
            let spec = spec.ok_or_else(|| anyhow::anyhow!("a version to install is required"))?;
            let version = manager.resolve_version(&spec).await?;
            println!("{}", manager.install(&version).await?);
        }
        Command::Remove { spec } => {
            let version = manager.resolve_installed(&spec).await?;
            manager.remove(&version).await?;
            println!("removed {}", version);
        }
        Command::Global { spec: None } => println!("{}", manager.get_global().await?),
        Command::Global { spec: Some(spec) } => {
            let version = manager.resolve_version(&spec).await?;
            manager.set_global(&version).await?;
            println!("{}", version);
        }
        Command::Local { spec: None } => {
            let local = manager
                .get_local()
                .await?
                .ok_or(ManagerError::NoLocalVersion)?;
            println!("{} ({})", local.version, local.path.display());
        }
        Command::Local { spec: Some(spec) } => {
            let version = manager.resolve_version(&spec).await?;
            let path = manager.set_local(&version).await?;
            println!("{} ({})", version, path.display());
        }
        Command::Env => match manager.get_env() {
            Some(version) => println!("{}", version),
            None => return Ok(ExitCode::FAILURE),
        },
        Command::Current => {
            let cwd = std::env::current_dir()?;
            let active = resolve_active(&manager, &cwd, &DEFAULT_PRECEDENCE)
                .await?
                .ok_or(ManagerError::NoActiveVersion)?;
            println!("{} ({})", active.version, active.source.as_str());
        }
        Command::Args { spec, args: None } => {
            let version = manager.resolve_installed(&spec).await?;
            match manager.get_args_for_version(&version).await {
                Ok(args) => println!("{}", args),
                Err(e) if e.is_not_set() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Command::Args {
            spec,
            args: Some(args),
        } => {
            let version = manager.resolve_version(&spec).await?;
            manager.set_args_for_version(&version, &args).await?;
        }
        Command::Run { spec, args } => {
            let version = manager.resolve_version(&spec).await?;
            return Ok(child_exit(manager.emulate(&version, &args).await?));
        }
        Command::Exec { args } => {
            let cwd = std::env::current_dir()?;
            return Ok(child_exit(run_active(&manager, &cwd, &args).await?));
        }
    }

    Ok(ExitCode::SUCCESS)
}
