//! Conclave Headless Simulation Harness
//!
//! Drives the [`conclave_core`] model without any rendering layer, with every
//! random decision drawn from a seeded, labelled channel so runs can be
//! recorded, replayed and compared draw by draw.
//!
//! # Two channels
//!
//! - **Model**: consumed by the rules (backlash rolls, proxy checks, dialogue)
//! - **Harness**: consumed by whoever chooses the moves (the explorer)
//!
//! Keeping them apart means a walk's policy can change without shifting a
//! single model draw.
//!
//! # Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ScenarioRunner / RandomWalker / replay_session           │
//! │       │                                                   │
//! │  ┌────▼───────────────────────────────┐                   │
//! │  │ HeadlessHarness                     │                   │
//! │  │  SimulatorModel + ActionController  │◄── DualRng        │
//! │  └─────────────────────────────────────┘                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use conclave_sim::{run_scenario, RandomWalker, RandomWalkConfig};
//! use conclave_sim::scenarios::ScenarioId;
//!
//! let result = run_scenario(&ScenarioId::FirstContact.scenario())?;
//! assert!(result.passed);
//!
//! let walks = RandomWalker::new(ScenarioId::FullHousehold.scenario(), RandomWalkConfig {
//!     iterations: 50,
//!     heuristic_scoring: true,
//!     ..Default::default()
//! })
//! .run()?;
//! ```

mod error;
mod harness;
mod scenario;
mod replay;
mod runner;
mod explorer;
pub mod scenarios;

pub use error::HarnessError;
pub use harness::{HarnessConfig, HarnessSnapshot, HeadlessHarness, Transition};
pub use scenario::{
    ActionRef, Assertion, AssertionFailure, BiographyConfig, CompareOp, GrievanceConfig,
    PartConfig, ProtectionConfig, ProxyConfig, RelationshipConfig, Scenario,
};
pub use replay::{
    apply_step, diff_json, replay_session, Divergence, FieldDiff, RecordedAction,
    RecordedSession, ReplayReport, RngCounts, SessionRecorder, SNAPSHOT_EPSILON,
};
pub use runner::{run_scenario, ScenarioResult, ScenarioRunner};
pub use explorer::{
    heuristic_score, iteration_seed, progress_score, softmax_pick, CoverageEntry, CoverageGap,
    CoverageLedger, GapKind, ObservedOutcome, RandomWalkConfig, RandomWalkResults, RandomWalker,
    Step, VictoryPath, WalkError, WalkTiming,
};
