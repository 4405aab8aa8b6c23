#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run-over-run analytics.
//!
//! Everything here is a pure function of its inputs. Raw snapshots are first
//! reduced to one latest event per entity ([`reduce::reduce`]); reduced
//! states are then compared ([`diff`]), checked for stability across runs
//! ([`stability`]), and summarized into trends ([`trend`]). None of these
//! functions can fail: empty states are valid inputs meaning "no data yet".

pub mod diff;
pub mod lookup;
pub mod reduce;
pub mod regions;
pub mod stability;
pub mod trend;

pub use diff::{derive_alerts, diff};
pub use lookup::lookup;
pub use reduce::reduce;
pub use regions::{kpis, new_entity_events, region_counts};
pub use stability::{persistence, ranked_appearances, stability};
pub use trend::build_trend;
