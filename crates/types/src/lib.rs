//! Core types, codecs and errors for the reldir directory.
//!
//! This crate provides the foundational pieces shared by every layer:
//! - Directory messages (objects, relations, manifests) re-exported from `reldir-proto`
//! - The [`Codec`] capability used by the typed store layer
//! - Etag hashing over canonical encodings
//! - Identifier validation
//! - The compiled authorization [`Model`] and directory [`Stats`]
//! - The [`ErrorCode`] catalog
//! - Configuration types

pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod properties;
pub mod types;
pub mod validation;

pub use codec::{Codec, CodecError, decode_json, encode_json};
pub use error::ErrorCode;
pub use hash::{body_etag, hash_bytes, object_etag, relation_etag};
pub use model::{
    CheckRequest, CheckResponse, GraphRequest, Model, ObjectTypeDef, PermissionDef, PermissionTerm,
    RelationDef, RelationStats, Stats, SubjectRef, TypeStats,
};
pub use reldir_proto::{
    Body, ExportOption, ExportRequest, ExportResponse, GetManifestRequest, GetManifestResponse,
    Manifest, ManifestMetadata, Object, ObjectIdentifier, Relation, RelationIdentifier, convert,
    export_response, get_manifest_response,
};
pub use types::*;
pub use validation::ValidationError;
