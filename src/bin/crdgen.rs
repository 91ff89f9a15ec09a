//! # CRD Generator
//!
//! Generates the Decofile CustomResourceDefinition YAML from the Rust type
//! definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/decofile.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;

use decofile_operator::crd::Decofile;

fn main() {
    match serde_yaml::to_string(&Decofile::crd()) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {}", e);
            std::process::exit(1);
        }
    }
}
