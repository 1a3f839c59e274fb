use std::path::Path;

use serde_json::json;

use towerline_core::escalation_reason;
use towerline_engine::EngineConfig;

use crate::input::{parse_at, read_decisions};
use crate::{print_json, OutputFormat};

pub(crate) fn cmd_escalation(
    path: &Path,
    at: Option<&str>,
    config: &EngineConfig,
    output: OutputFormat,
) -> Result<(), String> {
    let decisions = read_decisions(path)?;
    let now = parse_at(at)?;
    let policy = config.escalation.policy();

    let verdicts: Vec<_> = decisions
        .iter()
        .map(|d| (d, escalation_reason(d, &policy, now)))
        .collect();

    match output {
        OutputFormat::Json => {
            let body: Vec<_> = verdicts
                .iter()
                .map(|(d, reason)| {
                    json!({
                        "id": d.id,
                        "should_escalate": reason.is_some(),
                        "reason": reason.map(|r| r.as_str()),
                    })
                })
                .collect();
            print_json(&body)?;
        }
        OutputFormat::Text => {
            for (d, reason) in &verdicts {
                match reason {
                    Some(r) => println!("{}: escalate ({})", d.id, r.as_str()),
                    None => println!("{}: no escalation", d.id),
                }
            }
        }
    }
    Ok(())
}
