//! Deduplication of repeatedly re-evaluated decisions.
//!
//! Producers re-evaluate the same condition many times, so storage can
//! hold several rows for one `(tenant, metric, grain, period, entity)`.
//! Only the most recently updated row per key is live.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::contract::DecisionContract;

pub fn dedupe_key(d: &DecisionContract) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        d.tenant_id,
        d.metric_code,
        d.entity_type.as_str(),
        d.period,
        d.entity_id
    )
}

/// Total order used to pick the live row: newest `updated_at`, then highest
/// `version`, then greatest `id`. Independent of input order.
fn recency(a: &DecisionContract, b: &DecisionContract) -> Ordering {
    a.updated_at
        .cmp(&b.updated_at)
        .then_with(|| a.version.cmp(&b.version))
        .then_with(|| a.id.cmp(&b.id))
}

/// Collapse decisions sharing a dedupe key to the most recent one.
///
/// The result is sorted newest first (ties by id), so any permutation of
/// the same input yields the same output and the function is idempotent.
pub fn deduplicate(decisions: Vec<DecisionContract>) -> Vec<DecisionContract> {
    let mut live: HashMap<String, DecisionContract> = HashMap::with_capacity(decisions.len());
    for d in decisions {
        let key = dedupe_key(&d);
        match live.get(&key) {
            Some(current) if recency(&d, current) != Ordering::Greater => {}
            _ => {
                live.insert(key, d);
            }
        }
    }
    let mut out: Vec<DecisionContract> = live.into_values().collect();
    out.sort_by(|a, b| recency(b, a));
    out
}
