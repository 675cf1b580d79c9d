//! Data models for parcelforge.

mod county;
mod import_batch;
mod parcel;

pub use county::CountyQueueEntry;
pub use import_batch::{BatchStatus, ImportBatch, ImportStats};
pub use parcel::{
    OwnerAddress, ParcelRecord, PropertyFeatures, RiskFactors, SpatialFeatures,
};
