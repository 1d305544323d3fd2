//! # mce-algo: Least-Cost Dispatch and Pricing
//!
//! This crate turns one interval of market data ([`MarketInputs`]) into a
//! mixed-integer linear program, solves it, and prices the result.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Variable registry | [`registry`] | one variable per bid band, flow, loss and selector |
//! | Objective | [`objective`] | bid cost per MW, loss-factor adjusted |
//! | Constraint builders | [`constraints`] | rows grouped into named [`ConstraintSet`]s |
//! | Elasticity | [`elastic`] | penalised slacks on configured sets |
//! | Solver adapter | [`solver`] | primal values and row duals via `good_lp` |
//! | Orchestrator | [`orchestrator`] | MIP, fast-start loop, pricing LP, OCD reruns |
//!
//! Energy prices are the duals of the regional balance rows; the FCAS price
//! of a (region, service) pair is the sum of the duals of every requirement
//! row covering it. Both come from an LP in which the MIP's integer loss
//! segment selectors are fixed.
//!
//! ## Example
//!
//! ```ignore
//! use mce_algo::{DispatchConfig, Dispatcher};
//! use mce_core::{MarketInputsBuilder, Offer, RegionalDemand, UnitInfo};
//!
//! let inputs = MarketInputsBuilder::new()
//!     .region("NSW")
//!     .unit(UnitInfo::generator("A", "NSW"))
//!     .offer(Offer::energy("A", vec![50.0, 100.0], vec![20.0, 40.0]))
//!     .demand(RegionalDemand::new("NSW", 30.0))
//!     .build()?;
//!
//! let outcome = Dispatcher::with_config(DispatchConfig::default())?.dispatch(&inputs)?;
//! println!("NSW: ${:.2}/MWh", outcome.energy_price("NSW").unwrap_or_default());
//! ```

pub mod batch;
pub mod config;
pub mod constraints;
pub mod elastic;
pub mod error;
pub mod fast_start;
pub mod model;
pub mod objective;
pub mod orchestrator;
pub mod over_constrained;
pub mod registry;
pub mod results;
pub mod solver;

pub use batch::{dispatch_intervals, dispatch_sequence, BatchSummary};
pub use config::DispatchConfig;
pub use constraints::interconnector::LossSegmentSelection;
pub use constraints::ConstraintSet;
pub use elastic::{RowViolation, ViolationCost};
pub use error::DispatchError;
pub use fast_start::{FastStartConfig, FastStartStage, FastStartTarget};
pub use model::{BuildOptions, DispatchModel, ModelBuilder};
pub use orchestrator::{dispatch, DispatchState, Dispatcher};
pub use over_constrained::{
    ClipPolicy, OverConstrainedConfig, RhsOverride, ScenarioTieBreak, ScenarioVariant, BASE_SCENARIO,
    RELAXED_SCENARIO,
};
pub use results::{
    DispatchOutcome, EnergyPrice, FcasAvailability, FcasPrice, InterconnectorFlow, RegionSummary, UnitDispatch,
};
pub use solver::{available_solvers, backend_for, MipBackend, SolveOptions, SolverOutput};

pub use mce_core::MarketInputs;
pub use mce_solver_common::{SolutionStatus, SolverError, SolverId};
