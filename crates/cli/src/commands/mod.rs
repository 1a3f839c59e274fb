pub(crate) mod catalog;
pub(crate) mod dedupe;
pub(crate) mod escalation;
pub(crate) mod synthesize;
