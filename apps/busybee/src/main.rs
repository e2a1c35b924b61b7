mod config;
mod logging;
mod manifest;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use okapi_deploy::{EnableStrategy, Module, OkapiClient};
use std::path::PathBuf;

use crate::config::{AppConfig, CliOverrides};

/// Register module deployments with Okapi and enable modules for tenants
#[derive(Parser)]
#[command(name = "busybee", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Okapi base URL (overrides config)
    #[arg(long, global = true)]
    okapi_url: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register where every module in the manifest listens
    Deploy(ManifestArgs),
    /// Enable every module in the manifest for a tenant
    Enable(EnableArgs),
    /// Deploy, then enable
    Run(EnableArgs),
    /// Validate configuration and exit
    Check,
}

#[derive(Args)]
struct ManifestArgs {
    /// Module manifest (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    manifest: PathBuf,
}

#[derive(Args)]
struct EnableArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Tenant to enable the modules for
    #[arg(short, long)]
    tenant: String,

    /// check-then-create or unconditional-install (overrides config)
    #[arg(long)]
    strategy: Option<EnableStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // defaults -> YAML (if provided) -> env (BUSYBEE__*) -> CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        okapi_url: cli.okapi_url.clone(),
        verbose: cli.verbose,
    });

    logging::init(&config.logging)?;

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check_config(&config),
        Commands::Deploy(args) => {
            let okapi = connect(&config)?;
            let modules = manifest::load(&args.manifest)?;
            deploy(&okapi, &modules).await
        }
        Commands::Enable(args) => {
            let okapi = connect_with(&config, args.strategy)?;
            let modules = manifest::load(&args.manifest.manifest)?;
            enable(&okapi, &args.tenant, &modules).await
        }
        Commands::Run(args) => {
            let okapi = connect_with(&config, args.strategy)?;
            let modules = manifest::load(&args.manifest.manifest)?;
            deploy(&okapi, &modules).await?;
            enable(&okapi, &args.tenant, &modules).await
        }
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("checking configuration");
    config.validate()?;
    OkapiClient::new(&config.okapi).context("invalid okapi configuration")?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

fn connect(config: &AppConfig) -> Result<OkapiClient> {
    OkapiClient::new(&config.okapi).context("failed to set up okapi client")
}

fn connect_with(config: &AppConfig, strategy: Option<EnableStrategy>) -> Result<OkapiClient> {
    let okapi = connect(config)?;
    Ok(match strategy {
        Some(strategy) => okapi.with_strategy(strategy),
        None => okapi,
    })
}

async fn deploy(okapi: &OkapiClient, modules: &[Module]) -> Result<()> {
    tracing::info!(okapi = %okapi.base_url(), modules = modules.len(), "deploying modules");
    for module in modules {
        let record = okapi
            .deploy_module_to_http_loc(module)
            .await
            .with_context(|| format!("failed to deploy {module}"))?;
        if let Some(record) = record {
            println!("deployed {} at {} ({})", record.srvc_id, record.url, record.inst_id);
        }
    }
    Ok(())
}

async fn enable(okapi: &OkapiClient, tenant_id: &str, modules: &[Module]) -> Result<()> {
    let report = okapi
        .enable_modules_for_tenant(tenant_id, modules)
        .await
        .with_context(|| format!("failed to enable modules for tenant '{tenant_id}'"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
