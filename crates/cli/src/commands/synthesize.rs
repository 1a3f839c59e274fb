use std::path::Path;

use towerline_engine::synth::{synthesize, LiveFacts};
use towerline_engine::EngineConfig;

use crate::input::{parse_at, read_json};
use crate::{print_json, OutputFormat};

pub(crate) fn cmd_synthesize(
    facts_path: &Path,
    tenant: &str,
    at: Option<&str>,
    config: &EngineConfig,
    output: OutputFormat,
) -> Result<(), String> {
    let facts: LiveFacts = read_json(facts_path)?;
    let now = parse_at(at)?;
    let decisions = synthesize(tenant, &facts, &config.synth, now).map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&decisions)?,
        OutputFormat::Text => {
            if decisions.is_empty() {
                println!("no conditions detected");
            }
            for a in &decisions {
                println!(
                    "{} {:<8} {:<40} {} (impact {})",
                    a.priority,
                    a.decision.severity.as_str(),
                    a.decision.id,
                    a.decision.title,
                    a.decision.impact_amount
                );
            }
        }
    }
    Ok(())
}
