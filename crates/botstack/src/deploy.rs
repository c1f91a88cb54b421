//! Submit a synthesized template to CloudFormation

use anyhow::{bail, Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::types::{Capability, OnFailure, StackStatus};
use aws_sdk_cloudformation::Client as CfnClient;
use clap::Args;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Seconds to wait for the stack to settle
    #[arg(long, default_value = "900")]
    pub timeout: u64,

    /// Seconds between status polls
    #[arg(long, default_value = "10")]
    pub poll_interval: u64,
}

/// Create the stack, wait for a terminal status and return its outputs.
pub async fn create_stack(
    stack_name: &str,
    region: Option<&str>,
    template_body: String,
    args: &DeployArgs,
) -> Result<HashMap<String, String>> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    let aws_config = loader.load().await;
    let client = CfnClient::new(&aws_config);

    info!(stack = %stack_name, "Creating CloudFormation stack");
    client
        .create_stack()
        .stack_name(stack_name)
        .template_body(template_body)
        .capabilities(Capability::CapabilityIam)
        .on_failure(OnFailure::Delete)
        .send()
        .await
        .with_context(|| format!("Failed to create stack {}", stack_name))?;

    let attempts = (args.timeout / args.poll_interval.max(1)).max(1);
    for _ in 0..attempts {
        tokio::time::sleep(Duration::from_secs(args.poll_interval)).await;

        let stacks = client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .context("Failed to describe stack")?;
        let stack = stacks.stacks().first().context("Stack not found")?;

        match stack.stack_status() {
            Some(StackStatus::CreateComplete) => {
                info!(stack = %stack_name, "Stack created");
                let mut outputs = HashMap::new();
                for output in stack.outputs() {
                    if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
                        outputs.insert(key.to_string(), value.to_string());
                    }
                }
                return Ok(outputs);
            }
            Some(
                status @ (StackStatus::CreateFailed
                | StackStatus::DeleteComplete
                | StackStatus::DeleteFailed
                | StackStatus::RollbackComplete
                | StackStatus::RollbackFailed),
            ) => {
                let reason = stack.stack_status_reason().unwrap_or("no reason given");
                bail!(
                    "Stack {} ended in {}: {}",
                    stack_name,
                    status.as_str(),
                    reason
                );
            }
            Some(status) => {
                info!(stack = %stack_name, status = status.as_str(), "Waiting for stack");
            }
            None => warn!(stack = %stack_name, "Stack has no status yet"),
        }
    }

    bail!(
        "Timed out after {}s waiting for stack {}",
        args.timeout,
        stack_name
    )
}
