//! Commute group matching for campus services.
//!
//! Users declare recurring commute preferences (weekday, arrival or departure, time,
//! meeting point). This crate groups users whose preferences are compatible:
//!
//! - [`cluster`]: the pure bucketing, chaining and chunking algorithm
//! - [`CommuteMatchEngine`]: selects candidates, plans groups and commits them
//!   idempotently, one group at a time
//! - [`MatchPolicy`]: the named `scheduled` and `on_demand` configurations
//! - [`SweepRunner`]: the periodic background sweep
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_commute::{CommuteMatchEngine, MatchPolicy};
//! use campus_store::RocksStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/campus-db")?);
//! let engine = CommuteMatchEngine::new(store, 4);
//!
//! let report = engine.run(&MatchPolicy::on_demand(), chrono::Local::now().naive_local())?;
//! println!("created {} groups", report.groups_created);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cluster;
pub mod engine;
pub mod error;
pub mod policy;
pub mod runner;
pub mod types;

pub use engine::CommuteMatchEngine;
pub use error::{CommuteError, Result};
pub use policy::{MatchPolicy, Selection, Target};
pub use runner::SweepRunner;
pub use types::{CommuteConfig, GroupView, SweepReport};
