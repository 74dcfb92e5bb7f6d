//! Command fusion: the kind descriptor registry and the fusion engine.
//!
//! [`registry`] describes each concrete command kind once (accessors, fused
//! instance factory, point/supported flags) so the engine can operate on
//! `dyn Command` without matching on concrete types. [`engine::fuse`] is the
//! pure function that turns one object's command sequence into a fused,
//! deterministically ordered sequence.
//!
//! Contracts the engine upholds for any input:
//! * never mutates caller-supplied commands; all outputs are fresh values,
//! * commands of different kinds never merge,
//! * zero-duration commands pass through unmerged,
//! * re-fusing fused output yields a structurally identical sequence,
//! * output order is a pure function of the input multiset and the
//!   [`engine::OrderingContext`].

pub mod engine;
pub mod registry;

pub use engine::{
    commands_structurally_equal, fuse, CommandFusionResult, OrderingContext, EPSILON,
};
pub use registry::{descriptor_of, KindDescriptor, KindSnapshot};
