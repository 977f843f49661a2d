//! repolens - source-repository intelligence
//!
//! A feature map (routes, CLIs, tools, UI, tests, docs) built from
//! line-oriented pattern matching over a curated candidate set, an import
//! graph with cycle detection, and a weighted multi-metric health score.
//!
//! The main entry points are [`pipeline::build_feature_map`] and
//! [`pipeline::run_health`], both driven by a [`pipeline::Workspace`].

pub mod cache;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod graph;
pub mod imports;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod reporters;
pub mod scoring;
