//! Interactive `create` wizard writing a botstack.toml

use anyhow::{bail, Context, Result};
use botstack_config::{parse_s3_uri, StackConfig, DEFAULT_RETENTION_DAYS, VALID_RETENTION_DAYS};
use clap::Args;
use dialoguer::{Confirm, Input, Select};
use std::fs;
use std::path::PathBuf;

use crate::names;

const RETENTION_CHOICES: &[u32] = &[7, 30, 90, 365, DEFAULT_RETENTION_DAYS];

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Stack name
    #[arg(long)]
    pub stack_name: Option<String>,

    /// S3 URI of the handler bundle (s3://bucket/key.zip)
    #[arg(long)]
    pub function_code: Option<String>,

    /// S3 URI of the dependency layer bundle
    #[arg(long)]
    pub layer_code: Option<String>,

    /// Use an existing secret instead of creating one
    #[arg(long)]
    pub secret_arn: Option<String>,

    /// Log retention in days
    #[arg(long)]
    pub retention: Option<u32>,

    /// Where to write the config
    #[arg(long, default_value = "botstack.toml")]
    pub output: PathBuf,

    /// Overwrite existing file without asking
    #[arg(long)]
    pub force: bool,
}

/// Everything the wizard asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answers {
    pub stack_name: String,
    pub function_code: String,
    pub layer_code: String,
    pub secret_arn: Option<String>,
    pub retention_days: u32,
}

impl Answers {
    pub fn into_config(self) -> StackConfig {
        let mut config = StackConfig::default();
        config.stack.name = self.stack_name;
        config.function.code = self.function_code;
        config.layer.code = self.layer_code;
        config.secret.existing_arn = self.secret_arn;
        config.logging.retention_days = self.retention_days;
        config
    }
}

pub fn run(args: CreateArgs) -> Result<()> {
    println!();
    println!("botstack create - Slack bot on Lambda + HTTP API");
    println!();

    let stack_name = match args.stack_name {
        Some(name) => name,
        None => Input::new()
            .with_prompt("Stack name")
            .default(names::generate())
            .interact_text()?,
    };

    let function_code = prompt_s3("Handler bundle (s3://bucket/key.zip)", args.function_code)?;
    let layer_code = prompt_s3("Dependency layer bundle (s3://bucket/key.zip)", args.layer_code)?;

    let secret_arn = match args.secret_arn {
        Some(arn) => Some(arn),
        None => {
            let options = &[
                "Create  - New secret, store the token after deploy",
                "Import  - Use an existing secret ARN",
            ];
            let selection = Select::new()
                .with_prompt("Bot token secret")
                .items(options)
                .default(0)
                .interact()?;
            if selection == 0 {
                None
            } else {
                Some(Input::new().with_prompt("Secret ARN").interact_text()?)
            }
        }
    };

    let retention_days = match args.retention {
        Some(days) => {
            if !VALID_RETENTION_DAYS.contains(&days) {
                bail!(
                    "Invalid retention {} days. CloudWatch accepts: {:?}",
                    days,
                    VALID_RETENTION_DAYS
                );
            }
            days
        }
        None => {
            let options: Vec<String> = RETENTION_CHOICES
                .iter()
                .map(|d| format!("{} days", d))
                .collect();
            let selection = Select::new()
                .with_prompt("Log retention")
                .items(&options)
                .default(RETENTION_CHOICES.len() - 1)
                .interact()?;
            RETENTION_CHOICES[selection]
        }
    };

    let config = Answers {
        stack_name,
        function_code,
        layer_code,
        secret_arn,
        retention_days,
    }
    .into_config();
    config.validate()?;

    if args.output.exists() && !args.force {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", args.output.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    fs::write(&args.output, config.to_toml()?)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!();
    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Check the stack:     botstack lint");
    println!("  2. Render the template: botstack synth --output template.json");
    println!("  3. Deploy:");
    println!("     aws cloudformation deploy \\");
    println!("       --template-file template.json \\");
    println!("       --stack-name {} \\", config.stack.name);
    println!("       --capabilities CAPABILITY_IAM");
    if config.secret.existing_arn.is_none() {
        println!("  4. Store the bot token (the secret starts with a generated placeholder):");
        println!("     aws secretsmanager put-secret-value \\");
        println!("       --secret-id {} \\", config.secret.name);
        println!("       --secret-string '{{\"token\":\"<bot token>\"}}'");
    }
    println!();

    Ok(())
}

fn prompt_s3(prompt: &str, given: Option<String>) -> Result<String> {
    match given {
        Some(uri) => {
            validate_s3(&uri).map_err(|e| anyhow::anyhow!(e))?;
            Ok(uri)
        }
        None => Ok(Input::new()
            .with_prompt(prompt)
            .validate_with(validate_s3)
            .interact_text()?),
    }
}

#[allow(clippy::ptr_arg)]
fn validate_s3(input: &String) -> Result<(), String> {
    parse_s3_uri(input).map(|_| ()).map_err(|e| e.to_string())
}
