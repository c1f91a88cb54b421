//! Human-readable rendering of plans and lint reports

use std::fmt::Write;

use botstack_core::{LintReport, Stack};

/// Materialization order, one resource per line with what it waits for.
pub fn format_plan(stack: &Stack) -> botstack_core::Result<String> {
    let order = stack.graph.materialization_order()?;
    let mut out = String::new();
    let _ = writeln!(out, "Materialization plan for stack '{}':", stack.name);
    for (i, node) in order.iter().enumerate() {
        let marker = if node.resource.is_external() {
            " [imported]"
        } else {
            ""
        };
        let _ = write!(
            out,
            "  {:>2}. {} ({}){}",
            i + 1,
            node.id,
            node.resource.type_name(),
            marker
        );
        if !node.depends_on.is_empty() {
            let deps: Vec<&str> = node.depends_on.iter().map(|d| d.as_str()).collect();
            let _ = write!(out, " after {}", deps.join(", "));
        }
        let _ = writeln!(out);
    }
    if !stack.outputs.is_empty() {
        let _ = writeln!(out, "Outputs:");
        for output in &stack.outputs {
            let _ = writeln!(out, "  {} = {}", output.key, output.value);
        }
    }
    Ok(out)
}

pub fn format_lint(report: &LintReport) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        let _ = writeln!(out, "  ✗ {}", finding);
    }
    for suppressed in &report.suppressed {
        let _ = writeln!(
            out,
            "  ~ {} (suppressed: {})",
            suppressed.finding, suppressed.justification
        );
    }
    for (id, suppression) in &report.unused {
        let _ = writeln!(
            out,
            "  ? {} on {} [{}] matched nothing",
            suppression.rule_id, id, suppression.scope
        );
    }
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    let _ = writeln!(
        out,
        "{} error(s), {} warning(s), {} suppressed",
        errors,
        warnings,
        report.suppressed.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use botstack_config::StackConfig;
    use botstack_core::{Linter, StackBuilder};

    fn stack() -> Stack {
        let mut config = StackConfig::default();
        config.function.code = "s3://artifacts/handler.zip".to_string();
        config.layer.code = "s3://artifacts/layer.zip".to_string();
        StackBuilder::from_config(&config).build().unwrap()
    }

    #[test]
    fn test_plan_lists_every_resource_in_order() {
        let plan = format_plan(&stack()).unwrap();
        let first = plan.find("BotTokenSecret").unwrap();
        let function = plan.find(" BotFunction (").unwrap();
        let stage = plan.find("BotApiStage").unwrap();
        assert!(first < function && function < stage);
        assert!(plan.contains("ApiUrl = !GetAtt BotHttpApi.ApiEndpoint"));
    }

    #[test]
    fn test_lint_summary() {
        let report = Linter::with_default_rules().lint(&stack()).unwrap();
        let text = format_lint(&report);
        assert!(text.contains("0 error(s), 1 warning(s), 5 suppressed"));
        assert!(text.contains("SEC2"));
    }
}
