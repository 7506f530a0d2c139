//! Protobuf types and the exporter client for the reldir directory.
//!
//! This crate provides:
//! - Directory messages shared by the store, the directory layer and the wire ([`proto`])
//! - Timestamp conversions between chrono and protobuf ([`convert`])
//!
//! The schema lives in `proto/reldir/v1/reldir.proto`. Builds without
//! `protoc` use the checked-in output in `src/generated/`.

#![deny(unsafe_code)]
// gRPC calls return tonic::Status (176 bytes).
#![allow(clippy::result_large_err)]

/// Generated protobuf types and service clients.
pub mod proto {
    #![allow(clippy::all)]
    #![allow(missing_docs)]

    #[cfg(use_pregenerated_proto)]
    include!("generated/reldir.v1.rs");

    #[cfg(not(use_pregenerated_proto))]
    tonic::include_proto!("reldir.v1");
}

/// Conversions between chrono and protobuf timestamps.
pub mod convert;

pub use proto::{
    Body, ExportOption, ExportRequest, ExportResponse, GetManifestRequest, GetManifestResponse, Manifest,
    ManifestMetadata, Object, ObjectIdentifier, Relation, RelationIdentifier, export_response,
    get_manifest_response,
};
