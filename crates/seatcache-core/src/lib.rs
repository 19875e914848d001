//! seatcache-core: a tiered cache in front of a tournament seating
//! spreadsheet.
//!
//! Rows are read through [`source::RemoteDataSource`], normalized into
//! [`models::Table`]s by [`mapper`], served by [`cache::TieredCache`] and
//! watched for movement by [`detector::ChangeDetector`], which publishes
//! through a [`broadcast::Broadcaster`].

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod detector;
pub mod mapper;
pub mod models;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{Broadcaster, Subscription};
pub use cache::{CacheEntry, CacheSource, ClearScope, ReadOptions, TieredCache};
pub use config::Config;
pub use detector::{ChangeDetector, ChangeSet};
pub use models::{Player, Table};
pub use source::{RemoteDataSource, SourceError, TableSource};
