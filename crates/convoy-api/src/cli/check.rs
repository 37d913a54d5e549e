//! `convoy check`: validate the configuration directory.

use std::path::Path;

use anyhow::Result;
use console::style;
use serde_json::{json, Value};

use convoy_infra::config::{load_settings, parse_settings, SETTINGS_FILE};
use convoy_infra::plan_source::load_plan;
use convoy_types::error::ConfigError;
use convoy_types::plan::{DeliveryPlan, PlanSummary};
use convoy_types::settings::DeliverySettings;

/// Load the delivery files and settings the way `start` would, and report.
///
/// Exits with an error when the files would make `start` fail.
pub async fn check(config_dir: &Path, json: bool) -> Result<()> {
    let settings = load_settings(config_dir).await;
    let settings_error = settings_error(config_dir).await;
    let plan = load_plan(config_dir).await;

    if json {
        let mut report = check_report(config_dir, &plan, &settings);
        if let Some(err) = &settings_error {
            report["settings_error"] = json!(err.to_string());
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(config_dir, &plan, &settings);
        if let Some(err) = &settings_error {
            println!(
                "  {} {SETTINGS_FILE} ignored, defaults in use: {err}",
                style("!").yellow()
            );
            println!();
        }
    }

    plan.map(|_| ()).map_err(Into::into)
}

/// Why an existing `convoy.toml` would be replaced by defaults, if it would.
async fn settings_error(config_dir: &Path) -> Option<ConfigError> {
    let content = tokio::fs::read_to_string(config_dir.join(SETTINGS_FILE))
        .await
        .ok()?;
    parse_settings(&content).err()
}

fn check_report(
    config_dir: &Path,
    plan: &Result<DeliveryPlan, ConfigError>,
    settings: &DeliverySettings,
) -> Value {
    match plan {
        Ok(plan) => json!({
            "valid": true,
            "config_dir": config_dir.display().to_string(),
            "plan": plan.summary(),
            "gateway": settings.gateway.base_url,
            "failure_threshold": settings.failure_threshold,
        }),
        Err(err) => json!({
            "valid": false,
            "config_dir": config_dir.display().to_string(),
            "error": err.to_string(),
        }),
    }
}

fn print_report(
    config_dir: &Path,
    plan: &Result<DeliveryPlan, ConfigError>,
    settings: &DeliverySettings,
) {
    println!();
    println!(
        "  {} Checking {}",
        style("🔍").bold(),
        style(config_dir.display()).cyan()
    );
    println!();

    let summary: PlanSummary = match plan {
        Ok(plan) => plan.summary(),
        Err(err) => {
            println!("  {} {}", style("✗").red(), err);
            println!();
            return;
        }
    };

    let check_mark = format!("{}", style("✓").green());
    println!("  {check_mark} Conversation:  {}", style(&summary.conversation_id).bold());
    println!("  {check_mark} Credentials:   {}", style(summary.credentials).bold());
    println!("  {check_mark} Messages:      {}", style(summary.templates).bold());
    println!(
        "  {check_mark} Names:         {} first / {} last",
        summary.first_names, summary.last_names
    );
    println!("  {check_mark} Delay:         {}s", summary.delay_secs);
    println!();
    println!("  {}", style("── Engine ──").dim());
    println!("  Gateway:           {}", settings.gateway.base_url);
    println!("  Failure threshold: {}", settings.failure_threshold);
    println!("  Autostart delay:   {}s", settings.autostart_delay_secs);
    println!();
}
