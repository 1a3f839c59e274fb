use towerline_core::catalog;
use towerline_core::normalize::map_domain;
use towerline_core::MetricContract;

use crate::{print_json, OutputFormat};

pub(crate) fn cmd_catalog(
    domain: Option<&str>,
    actionable: bool,
    trust_risk: bool,
    output: OutputFormat,
) -> Result<(), String> {
    let domain = match domain {
        Some(raw) => Some(map_domain(raw).ok_or_else(|| format!("unknown domain '{raw}'"))?),
        None => None,
    };

    let metrics: Vec<&MetricContract> = catalog::all()
        .iter()
        .filter(|m| domain.is_none_or(|d| m.domain == d))
        .filter(|m| !actionable || m.is_actionable)
        .filter(|m| !trust_risk || m.has_trust_risk())
        .collect();

    match output {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Text => {
            for m in &metrics {
                let mut flags = Vec::new();
                if m.is_actionable {
                    flags.push("actionable");
                }
                if m.has_trust_risk() {
                    flags.push("trust-risk");
                }
                println!(
                    "{:<32} {:<4} {:<9} v{:<2} {}{}",
                    m.code,
                    m.domain.as_str(),
                    m.unit.as_str(),
                    m.version,
                    m.label,
                    if flags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", flags.join(", "))
                    }
                );
            }
            println!("{} metric(s)", metrics.len());
        }
    }
    Ok(())
}
