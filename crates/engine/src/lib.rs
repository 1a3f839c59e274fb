//! towerline-engine: the stateful half of the decision engine.
//!
//! Wires the pure contracts in `towerline-core` to a `RowStore`:
//!
//! - [`adapter`] -- FDP / MDP / CDP adapters over persisted rows
//! - [`synth`] -- auto decisions from live facts, with a side-store overlay
//! - [`control_tower`] -- cross-domain reads with escalation on read
//! - [`service`] -- routes mutations by decision id
//! - [`audit`] -- append-only audit log
//! - [`cache`] / [`refresh`] -- summary caching and background recomputation

pub mod adapter;
pub mod audit;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod control_tower;
pub mod error;
pub mod mutation;
pub mod refresh;
pub mod row;
pub mod service;
pub mod synth;

pub use adapter::DomainAdapter;
pub use audit::AuditLog;
pub use cache::{CacheScope, SummaryCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConcurrencyMode, EngineConfig};
pub use context::EngineContext;
pub use control_tower::{ControlTower, ControlTowerAnalytics};
pub use error::EngineError;
pub use mutation::{DecisionLifecycle, Mutation};
pub use refresh::RefreshHandle;
pub use service::DecisionService;
pub use synth::{AutoDecision, AutoSynthesizer, FactSource, LiveFacts, StaticFactSource};
