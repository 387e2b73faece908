//! Energy usage handlers.

use serde::Serialize;
use tabled::Tabled;

use homeboard_core::{EnergySample, EnergySummary, Hub};

use crate::cli::{EnergyArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct EnergyRow {
    #[tabled(rename = "Hour")]
    hour: String,
    #[tabled(rename = "Usage kWh")]
    usage: String,
    #[tabled(rename = "Solar kWh")]
    solar: String,
    #[tabled(rename = "Net kWh")]
    net: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&EnergySample> for EnergyRow {
    fn from(s: &EnergySample) -> Self {
        Self {
            hour: s.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
            usage: format!("{:.2}", s.usage_kwh),
            solar: format!("{:.2}", s.solar_generation_kwh),
            net: format!("{:.2}", s.net_kwh()),
            cost: output::or_dash(s.cost_usd.map(|c| format!("${c:.2}"))),
        }
    }
}

#[derive(Serialize)]
struct Totals {
    #[serde(flatten)]
    summary: EnergySummary,
    net_kwh: f64,
}

fn totals_detail(t: &Totals) -> String {
    [
        format!("Samples: {}", t.summary.samples),
        format!("Usage:   {:.2} kWh", t.summary.usage_kwh),
        format!("Solar:   {:.2} kWh", t.summary.solar_generation_kwh),
        format!("Net:     {:.2} kWh", t.net_kwh),
        format!("Cost:    ${:.2}", t.summary.cost_usd),
    ]
    .join("\n")
}

#[allow(clippy::unnecessary_wraps)]
pub fn handle(hub: &Hub, args: &EnergyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let samples = hub.energy_snapshot();
    let summary = EnergySummary::from_samples(&samples);
    let totals = Totals {
        net_kwh: summary.usage_kwh - summary.solar_generation_kwh,
        summary,
    };

    if !args.summary {
        let out = output::render_list(
            &global.output,
            samples.as_slice(),
            |s| EnergyRow::from(s),
            |s| s.recorded_at.to_rfc3339(),
        );
        output::print_output(&out, global.quiet);
        if !matches!(global.output, OutputFormat::Table) {
            return Ok(());
        }
        output::print_output("", global.quiet);
    }

    let out = output::render_single(&global.output, &totals, totals_detail, |t| {
        format!("{:.2}", t.net_kwh)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
