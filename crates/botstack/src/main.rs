use anyhow::{Context, Result};
use botstack::{build_stack, create, init_tracing, load_config, report, sensitive_values};
use botstack_config::StackConfig;
use botstack_core::{synthesize, Linter, SynthOptions, TeardownPlan};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Plan, lint and synthesize the infrastructure of a chat-bot backend
#[derive(Parser)]
#[command(name = "botstack")]
#[command(version)]
#[command(
    about = "Plan, lint and synthesize the infrastructure of a chat-bot backend",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a botstack.toml interactively
    Create(create::CreateArgs),
    /// Render the CloudFormation template
    Synth {
        /// Write the template here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Env vars holding real secrets that must not appear in the template
        #[arg(
            long = "sensitive-env",
            value_name = "VAR",
            default_value = botstack::DEFAULT_SENSITIVE_ENV
        )]
        sensitive_env: Vec<String>,
    },
    /// Show the materialization order
    Plan,
    /// Run the policy linter
    Lint,
    /// Show what teardown deletes and keeps
    Teardown,
    /// Synthesize and create the stack in AWS
    #[cfg(feature = "aws-deploy")]
    Deploy(botstack::deploy::DeployArgs),
}

fn main() -> Result<()> {
    let Cli {
        command,
        config,
        log_level,
    } = Cli::parse();

    // every command but `create` needs a loaded config
    let setup = || -> Result<StackConfig> {
        let config = load_config(config.as_deref(), log_level.as_deref())?;
        init_tracing(&config.cli);
        Ok(config)
    };

    match command {
        Commands::Create(args) => create::run(args),
        Commands::Synth {
            output,
            sensitive_env,
        } => run_synth(&setup()?, output, &sensitive_env),
        Commands::Plan => run_plan(&setup()?),
        Commands::Lint => run_lint(&setup()?),
        Commands::Teardown => run_teardown(&setup()?),
        #[cfg(feature = "aws-deploy")]
        Commands::Deploy(args) => run_deploy(&setup()?, args),
    }
}

fn run_synth(
    config: &StackConfig,
    output: Option<PathBuf>,
    sensitive_env: &[String],
) -> Result<()> {
    let stack = build_stack(config)?;
    let options = SynthOptions {
        known_sensitive_values: sensitive_values(sensitive_env),
    };
    let synthesized = synthesize(&stack, &options)?;
    let body = synthesized.to_pretty_json();

    match output {
        Some(path) => {
            fs::write(&path, &body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote template");
        }
        None => println!("{}", body),
    }
    Ok(())
}

fn run_plan(config: &StackConfig) -> Result<()> {
    let stack = build_stack(config)?;
    botstack_core::validate(&stack)?;
    print!("{}", report::format_plan(&stack)?);
    Ok(())
}

fn run_lint(config: &StackConfig) -> Result<()> {
    let stack = build_stack(config)?;
    let lint_report = Linter::with_default_rules().lint(&stack)?;
    print!("{}", report::format_lint(&lint_report));
    lint_report.ensure_clean()?;
    Ok(())
}

fn run_teardown(config: &StackConfig) -> Result<()> {
    let stack = build_stack(config)?;
    print!("{}", TeardownPlan::for_stack(&stack)?);
    Ok(())
}

#[cfg(feature = "aws-deploy")]
fn run_deploy(config: &StackConfig, args: botstack::deploy::DeployArgs) -> Result<()> {
    let stack = build_stack(config)?;
    let options = SynthOptions {
        known_sensitive_values: sensitive_values(&[botstack::DEFAULT_SENSITIVE_ENV]),
    };
    let template = synthesize(&stack, &options)?.to_pretty_json();

    let outputs = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(botstack::deploy::create_stack(
            &config.stack.name,
            config.stack.region.as_deref(),
            template,
            &args,
        ))?;

    println!("Stack {} created", config.stack.name);
    for key in ["SecretConsoleUrl", "ApiUrl"] {
        if let Some(value) = outputs.get(key) {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}
