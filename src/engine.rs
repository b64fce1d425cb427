//! Typography engine.
//!
//! This module is the *public entry point* of the rule pipeline. It is split
//! into focused submodules under `src/engine/` while keeping public paths
//! stable (for example `crate::engine::CompiledRules`).
//!
//! ## How the parts work together
//!
//! ```text
//! RuleDef / InnerRuleDef ──┐
//!                          │  RuleRegistry::register      (registry.rs)
//!                          └──────────────┬──────────────
//!                                         │ compile()
//!                                         v
//!                               Arc<CompiledRules>   (shared, immutable)
//!                                         │
//!                                         │ EngineConfig::seeded  (config.rs)
//!                                         v
//! input ── DocumentTraits::scan ──> PipelineExecutor::run     (executor.rs)
//!          (scan.rs)                  - queues in fixed order
//!                                     - Protector hide/show   (protector.rs)
//!                                     - entity decode/restore (entities.rs)
//!                                         │
//!                                         v
//!                                  text + RunMetrics          (metrics.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `registry.rs`: parses rule names, resolves ordering indexes, sorts and
//!   freezes the rule list into `CompiledRules` with a per-queue index.
//! - `config.rs`: the per-engine enabled map and settings map, plus masks.
//! - `scan.rs`: cheap input classification (`DocumentTraits`).
//! - `protector.rs`: placeholder-based hiding of markup, URLs and user tags.
//! - `entities.rs`: HTML entity decoding and re-encoding.
//! - `executor.rs`: runs one `execute()` call.
//! - `metrics.rs`: timing and trace records for verbose runs.
//!
//! ## Adding new rules
//!
//! Rules live under `src/rules/**` and are registered in `rules::registry()`.
//! A rule that needs a new group must register that group's base index with
//! `RuleRegistry::with_group` first.
//!
//! ## Debugging
//!
//! Queue completion is logged at `debug` level and every applied rule at
//! `trace` level through `tracing`. `Typographer::execute_verbose` returns the
//! full per-rule trace.

#[path = "engine/config.rs"]
mod config;
#[path = "engine/entities.rs"]
mod entities;
#[path = "engine/executor.rs"]
mod executor;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/protector.rs"]
mod protector;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/scan.rs"]
mod scan;

pub use config::{EngineConfig, LineEnding};
pub use entities::{EntityKind, HtmlEntityMode};
pub(crate) use executor::PipelineExecutor;
pub use metrics::{QueueMetrics, RuleStep, RunMetrics};
pub use protector::{ProtectedTag, SafeTags};
pub use registry::{CompiledRules, RuleRegistry};
pub use scan::DocumentTraits;
