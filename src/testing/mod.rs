//! Linearizability checking for the structures in this crate.
//!
//! Each structure can be built with an [`EventMonitor`] attached. At the
//! instant an operation takes effect, while it still holds whatever makes the
//! effect exclusive, the structure appends an [`Event`] to the monitor. The
//! monitor's total order of events is therefore a legal linearization of the
//! run if and only if replaying it against a sequential [`Oracle`] reproduces
//! every observed result.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use listcurrent::structures::LazySet;
//! use listcurrent::testing::{
//!     Harness, HarnessConfig, OpGenerator, SequentialSet, DEFAULT_SET_WEIGHTS,
//! };
//!
//! let harness = Harness::new(HarnessConfig::default().with_threads(4));
//! let monitor = Arc::new(harness.config().monitor());
//! let mut set = LazySet::with_monitor(monitor.clone());
//! let generator = OpGenerator::new(&DEFAULT_SET_WEIGHTS, 2000, 32, 0).unwrap();
//! let mut oracle = SequentialSet::new();
//!
//! let report = harness.check(&mut set, &generator, &mut oracle, &monitor).unwrap();
//! assert!(report.is_valid());
//! assert_eq!(report.events, 2000);
//! ```

pub use self::error::{GeneratorError, HarnessError, ValidationError};
pub use self::event::{Event, EventHandle};
pub use self::generator::{
    OpGenerator, DEFAULT_GENERATOR_SEED, DEFAULT_MULTISET_WEIGHTS, DEFAULT_OP_MOD,
    DEFAULT_SET_WEIGHTS, DEFAULT_STACK_WEIGHTS, OPERATION_COUNT,
};
pub use self::harness::{final_state_matches, Harness, HarnessConfig, RunReport};
pub use self::monitor::{EventMonitor, MonitorConfig, MonitorState};
pub use self::operation::{
    Apply, MultisetOp, MultisetOperator, Operation, OperatorKind, SetOp, SetOperator, StackOp,
    StackOperator, StackOutcome,
};
pub use self::oracle::{Oracle, SequentialMultiset, SequentialSet, SequentialStack};
pub use self::recorder::Recorder;

mod error;
mod event;
mod generator;
mod harness;
mod monitor;
mod operation;
mod oracle;
mod recorder;
