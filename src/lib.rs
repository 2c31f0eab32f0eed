//! UK income tax and National Insurance liability calculation.
//!
//! Every calculator in [`core`] is usable on its own; [`core::Orchestrator`] runs them in
//! statutory order, records the breakdown and commits one liability snapshot per return.

pub mod core;
