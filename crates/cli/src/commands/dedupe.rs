use std::path::Path;

use towerline_core::{dedupe_key, deduplicate};

use crate::input::read_decisions;
use crate::{print_json, OutputFormat};

pub(crate) fn cmd_dedupe(path: &Path, output: OutputFormat) -> Result<(), String> {
    let decisions = read_decisions(path)?;
    let before = decisions.len();
    let live = deduplicate(decisions);

    match output {
        OutputFormat::Json => print_json(&live)?,
        OutputFormat::Text => {
            for d in &live {
                println!("{}  {}", d.id, dedupe_key(d));
            }
            println!("{} of {} decision(s) live", live.len(), before);
        }
    }
    Ok(())
}
