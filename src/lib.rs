//! Parcelforge - Florida cadastral parcel ingestion pipeline.
//!
//! Ingests county parcel data from heterogeneous geospatial sources
//! (shapefile, CSV, GeoJSON), validates and enriches each parcel with
//! derived spatial metrics and heuristic risk scores, and loads the
//! normalized records into a staging store that can be atomically
//! swapped into production.

pub mod cli;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod sources;
pub mod swap;
pub mod transform;
