//! Reading command inputs from disk.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use towerline_core::DecisionContract;

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<DecisionContract>),
    One(Box<DecisionContract>),
}

/// A decision file holds either a single decision or an array of them.
pub(crate) fn read_decisions(path: &Path) -> Result<Vec<DecisionContract>, String> {
    Ok(match read_json::<OneOrMany>(path)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(d) => vec![*d],
    })
}

pub(crate) fn parse_at(at: Option<&str>) -> Result<OffsetDateTime, String> {
    match at {
        Some(s) => OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|e| format!("invalid --at timestamp {s:?}: {e}")),
        None => Ok(OffsetDateTime::now_utc()),
    }
}
