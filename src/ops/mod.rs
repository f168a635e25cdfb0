//! The eight base relational operators plus `Exchange` (spec.md §4.1),
//! laid out one file per operator - the convention the teacher uses for
//! its own stream operators (`src/event_processing/operators/*.rs`).

pub mod aggregate;
pub mod equijoin;
pub mod exchange;
pub mod filter;
pub mod identity;
pub mod input;
pub mod matview;
pub mod project;
pub mod union;
