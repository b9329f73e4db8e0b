#![doc = "issue-bucket-core: connectors and pipelines for issue-bucket."]

//! This crate contains all domain logic for issue-bucket: the object-store
//! key-space manager, the issue tracker and file connectors, the query runner
//! and the extraction pipeline. Vendor SDK bindings live in the CLI crate and
//! plug in through the traits in [`contract`].
//!
//! # Usage
//! Wrap any [`contract::ObjectStore`] in a [`bucket::Bucket`] to get folder
//! semantics (listing, statistics, copy/move, deletion) over a flat key space.

pub mod bucket;
pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod files;
pub mod keyspace;
pub mod query;
pub mod tracker;
