//! Association resolution for sqlassoc.
//!
//! - [`AssociationRegistry`] holds association definitions per source relation.
//! - [`JoinResolver`] turns a definition plus schema descriptors into a
//!   [`ResolvedJoinPlan`]: ordered join steps and a disambiguated projection.
//! - [`combine_keys`] derives the parent/child key pair of a plan.
//! - [`Materializer`] executes a plan in one query, or batch-loads children
//!   for known parents; [`combine`] groups them in memory.
//! - [`PlanCache`] memoizes plans per schema version.
//! - [`Configuration`] and [`Container`] form the configuration layer that
//!   skips relations and associations whose tables are missing.

pub mod cache;
pub mod combine;
pub mod combiner;
pub mod config;
pub mod materialize;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use cache::{PlanCache, PlanCacheConfig};
pub use combine::{CombineKeys, combine_keys};
pub use combiner::{Combined, combine};
pub use config::{Configuration, Container};
pub use materialize::{Materializer, Relation};
pub use registry::AssociationRegistry;
pub use resolver::{JoinResolver, JoinStep, ProjectedAttribute, ResolvedJoinPlan};
