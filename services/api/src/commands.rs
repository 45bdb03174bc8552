use crate::cli::DataArgs;
use crate::infra::{load_config, load_rule_store, open_storage};
use chrono::SecondsFormat;
use clap::Args;
use lead_score::error::AppError;
use lead_score::workflows::scoring::{format_brl, CalculationResult, RuleStore, ScoreInput};
use lead_score::workflows::webhooks::{read_cached, WebhookPayload};
use std::fmt::Write;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Destination region as typed on the form
    #[arg(long)]
    pub(crate) region: String,
    /// Number of wedding guests
    #[arg(long)]
    pub(crate) guests: String,
    /// Total investment, e.g. "R$ 300.000,00"
    #[arg(long)]
    pub(crate) investment: String,
    #[command(flatten)]
    pub(crate) data: DataArgs,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = load_config(args.data)?;
    let store = load_rule_store(&config, open_storage(&config));

    let input = ScoreInput::from_form(&args.region, &args.guests, &args.investment)?;
    let result = input.evaluate(
        store.regions(),
        store.thresholds(),
        store.settings().cutoff_score,
    );

    print!(
        "{}",
        render_result(&input, &result, store.settings().cutoff_score)
    );
    Ok(())
}

pub(crate) fn run_rules_show(args: DataArgs) -> Result<(), AppError> {
    let config = load_config(args)?;
    let store = load_rule_store(&config, open_storage(&config));
    print!("{}", render_rules(&store));
    Ok(())
}

pub(crate) fn run_rules_reset(args: DataArgs) -> Result<(), AppError> {
    let config = load_config(args)?;
    let mut store = load_rule_store(&config, open_storage(&config));
    store.reset_to_defaults();
    println!("Rules restored to defaults in {}", config.storage.data_dir.display());
    print!("{}", render_rules(&store));
    Ok(())
}

pub(crate) fn run_webhooks(args: DataArgs) -> Result<(), AppError> {
    let config = load_config(args)?;
    let storage = open_storage(&config);
    let payloads = read_cached(storage.as_ref())?;
    print!("{}", render_payloads(&payloads));
    Ok(())
}

fn render_result(input: &ScoreInput, result: &CalculationResult, cutoff: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Lead Score");
    let _ = writeln!(out, "==========");
    let _ = writeln!(
        out,
        "Region: {} (weight {})",
        input.region, result.region_weight
    );
    let _ = writeln!(out, "Guests: {}", input.guests);
    let _ = writeln!(out, "Investment: {}", format_brl(input.investment));
    let _ = writeln!(
        out,
        "Per-guest value: {}",
        format_brl(result.per_guest_value)
    );
    match result.threshold_applied {
        Some(threshold) => {
            let _ = writeln!(
                out,
                "Threshold applied: {} (weight {})",
                format_brl(threshold),
                result.value_weight
            );
        }
        None => {
            let _ = writeln!(out, "Threshold applied: none");
        }
    }
    let _ = writeln!(out, "Final score: {}", result.final_score);
    let _ = writeln!(out, "Verdict: {} (cutoff {})", result.verdict_label(), cutoff);
    out
}

fn render_rules(store: &RuleStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Regions");
    for region in store.regions() {
        let _ = writeln!(out, "  [{}] {}: {}", region.id, region.name, region.weight);
    }

    let _ = writeln!(out, "Thresholds");
    for threshold in &store.sorted_thresholds() {
        let _ = writeln!(
            out,
            "  [{}] {}: {}",
            threshold.id,
            format_brl(threshold.value),
            threshold.weight
        );
    }

    let settings = store.settings();
    let crm = &settings.crm;
    let _ = writeln!(out, "Cutoff score: {}", settings.cutoff_score);
    let _ = writeln!(
        out,
        "ActiveCampaign: {} (field '{}', id {})",
        if crm.base_url.is_empty() { "<not set>" } else { crm.base_url.as_str() },
        crm.deal_field,
        if crm.custom_field_id.is_empty() { "<unresolved>" } else { crm.custom_field_id.as_str() }
    );
    out
}

fn render_payloads(payloads: &[WebhookPayload]) -> String {
    if payloads.is_empty() {
        return "No webhook payloads cached\n".to_string();
    }

    let mut out = String::new();
    for payload in payloads {
        let _ = writeln!(
            out,
            "{} {}",
            payload.received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            payload.id
        );
        let body = serde_json::to_string_pretty(&payload.data).unwrap_or_default();
        for line in body.lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}
