//! Build script for reldir-proto.
//!
//! Compiles `proto/reldir/v1/reldir.proto` with tonic-prost-build when the
//! schema and `protoc` are available. Otherwise the checked-in code in
//! `src/generated/` is used.

use std::path::Path;

const PROTO: &str = "../../proto/reldir/v1/reldir.proto";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo::rustc-check-cfg=cfg(use_pregenerated_proto)");

    if !Path::new(PROTO).exists() {
        println!("cargo::rustc-cfg=use_pregenerated_proto");
        return Ok(());
    }
    println!("cargo::rerun-if-changed={PROTO}");

    let generated = tonic_prost_build::configure()
        .build_server(false)
        .build_client(true)
        .emit_rerun_if_changed(true)
        .compile_protos(&[PROTO], &["../../proto"]);

    if let Err(e) = generated {
        println!("cargo::warning=using pre-generated proto code: {e}");
        println!("cargo::rustc-cfg=use_pregenerated_proto");
    }
    Ok(())
}
