//! CRD YAML Generator
//!
//! Prints the Kubernetes CRD manifests for all custom resources managed by
//! the kit-operator.
//!
//! Usage: cargo run --bin crdgen > config/crds/all.yaml

use kit_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
