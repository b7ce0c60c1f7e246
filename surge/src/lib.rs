#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod iteration;
pub mod scenario;

mod abort;
mod error;

pub(crate) mod measurement;
pub(crate) mod recorder;
pub(crate) mod timer;
pub(crate) mod vu_pool;

pub use abort::AbortHandle;
pub use error::ScenarioError;
pub use iteration::{pause, run_iteration, HttpIteration, HttpRequest, Iteration};
pub use scenario::{ConfigurableScenario, Scenario};

pub use surge_core as core;

pub mod prelude {
    pub use crate::iteration::{pause, HttpIteration, Iteration};
    pub use crate::scenario::{ConfigurableScenario, Scenario};
    pub use crate::{AbortHandle, ScenarioError};

    pub use surge_core::{Check, IterationOutcome, Preset, ResponseMeta, RunStatistics};
}
