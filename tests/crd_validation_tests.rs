//! CRD schema and deserialization tests
//!
//! Validates that the generated Decofile CRD carries the expected
//! coordinates and that user-authored manifests deserialize with the
//! documented defaults.

use kube::core::CustomResourceExt;

use decofile_operator::crd::{Decofile, DecofileSpec, SourceType};

#[test]
fn test_crd_coordinates() {
    let crd = Decofile::crd();
    assert_eq!(crd.spec.group, "deco.sites");
    assert_eq!(crd.spec.names.kind, "Decofile");
    assert_eq!(crd.spec.names.plural, "decofiles");
    assert_eq!(crd.spec.scope, "Namespaced");

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha1");
    assert!(version.subresources.as_ref().is_some_and(|s| s.status.is_some()));
}

#[test]
fn test_crd_has_ready_printcolumn() {
    let crd = Decofile::crd();
    let columns = crd.spec.versions[0]
        .additional_printer_columns
        .as_ref()
        .expect("printcolumns present");
    assert!(columns.iter().any(|c| c.name == "Ready"));
    assert!(columns.iter().any(|c| c.name == "Source"));
}

#[test]
fn test_crd_yaml_serializes() {
    let yaml = serde_yaml::to_string(&Decofile::crd()).unwrap();
    assert!(yaml.contains("deco.sites"));
    assert!(yaml.contains("Decofile"));
}

#[test]
fn test_inline_manifest_deserializes() {
    let spec: DecofileSpec = serde_yaml::from_str(
        r#"
source: inline
inline:
  value:
    pages.json:
      home:
        title: Hello
"#,
    )
    .unwrap();
    assert_eq!(spec.source, SourceType::Inline);
    assert!(!spec.silent);
    let inline = spec.inline.unwrap();
    assert_eq!(inline.value["pages.json"]["home"]["title"], "Hello");
}

#[test]
fn test_github_manifest_deserializes() {
    let spec: DecofileSpec = serde_yaml::from_str(
        r#"
source: github
deploymentId: site-42
silent: true
github:
  org: deco-sites
  repo: storefront
  commit: 4fe3a11
  path: .deco/blocks
  secret: github-credentials
"#,
    )
    .unwrap();
    assert_eq!(spec.source, SourceType::Github);
    assert!(spec.silent);
    assert_eq!(spec.deployment_id.as_deref(), Some("site-42"));
    let github = spec.github.unwrap();
    assert_eq!(github.org, "deco-sites");
    assert_eq!(github.secret.as_deref(), Some("github-credentials"));
}

#[test]
fn test_unknown_source_rejected() {
    let result: Result<DecofileSpec, _> = serde_yaml::from_str("source: gitlab");
    assert!(result.is_err());
}
