//! Property-based tests for name generation, settings validation and the
//! workload catalog.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;

use ephem_cli::domain::config::{
    Settings, VALID_SETTING_KEYS, validate_setting_key, validate_setting_value,
};
use ephem_cli::domain::resources::{generate_resource_name, validate_resource_name};
use ephem_cli::domain::workload::{CATALOG, Workload, WorkloadSelection};

// ============================================================================
// generate_resource_name() property tests
// ============================================================================

proptest! {
    /// Generated names always have the expected format: ephem- prefix + 16 hex chars.
    #[test]
    fn prop_resource_name_has_valid_format(_seed in 0u32..100) {
        let name = generate_resource_name();
        prop_assert!(name.starts_with("ephem-"), "missing prefix: {}", name);
        prop_assert_eq!(name.len(), 22, "wrong length: {}", name);
        prop_assert!(validate_resource_name(&name).is_ok());
    }

    /// Anything that is not prefix + 16 hex chars is rejected.
    #[test]
    fn prop_malformed_names_rejected(suffix in "[g-z]{1,16}|[0-9a-f]{1,15}|[0-9a-f]{17,20}") {
        let name = format!("ephem-{suffix}");
        prop_assert!(validate_resource_name(&name).is_err(), "accepted {}", name);
    }
}

#[test]
fn test_resource_name_uniqueness_batch() {
    let names: std::collections::HashSet<_> = (0..100).map(|_| generate_resource_name()).collect();
    assert_eq!(names.len(), 100, "duplicate names generated");
}

// ============================================================================
// Settings validation property tests
// ============================================================================

proptest! {
    /// Keys outside the whitelist are rejected.
    #[test]
    fn prop_arbitrary_keys_rejected(key in "[a-z]{1,12}\\.[a-z]{1,12}") {
        if !VALID_SETTING_KEYS.contains(&key.as_str()) {
            prop_assert!(validate_setting_key(&key).is_err(), "accepted invalid key: {}", key);
        }
    }

    /// Well-formed AMI ids are accepted.
    #[test]
    fn prop_valid_ami_ids_accepted(hex in "[0-9a-f]{17}") {
        let value = format!("ami-{hex}");
        prop_assert!(validate_setting_value("instance.image_id", &value).is_ok());
    }

    /// Shell metacharacters never pass any string-valued setting.
    #[test]
    fn prop_shell_metacharacters_rejected(
        prefix in "[a-z0-9]{1,8}",
        meta in prop::sample::select(vec![";", "|", "&", "$(", "`", " ", "\n"]),
    ) {
        let value = format!("{prefix}{meta}x");
        for key in ["region", "instance.instance_type", "ssh.user", "workloads.custom_image"] {
            prop_assert!(
                validate_setting_value(key, &value).is_err(),
                "{} accepted {:?}", key, value
            );
        }
    }

    /// Any port from 1 to 65535 round-trips through `set` and `get`.
    #[test]
    fn prop_ssh_port_set_and_get(port in 1u16..=u16::MAX) {
        let mut settings = Settings::default();
        settings.set("ssh.port", &port.to_string()).unwrap();
        prop_assert_eq!(settings.ssh.port, port);
        prop_assert_eq!(settings.get("ssh.port"), Some(port.to_string()));
    }
}

#[test]
fn test_every_whitelisted_key_is_readable() {
    let settings = Settings::default();
    for key in VALID_SETTING_KEYS {
        assert!(settings.get(key).is_some(), "no getter for {key}");
    }
}

// ============================================================================
// Workload catalog property tests
// ============================================================================

proptest! {
    /// Valid image overrides are used verbatim and end the command sequence.
    #[test]
    fn prop_override_image_is_run(image in "[a-z][a-z0-9]{0,10}(:[a-z0-9.]{1,8})?") {
        for workload in CATALOG {
            let selection = WorkloadSelection::resolve(workload, Some(&image), None).unwrap();
            prop_assert_eq!(selection.image(), image.as_str());
            let commands = selection.commands();
            prop_assert_eq!(commands.len(), 4);
            let pull = format!("sudo docker pull {image}");
            prop_assert_eq!(commands[2].as_str(), pull.as_str());
            let run_suffix = format!(" {image}");
            prop_assert!(
                commands[3].ends_with(&run_suffix),
                "run command {} does not end with the image",
                commands[3]
            );
        }
    }
}

#[test]
fn test_catalog_labels_parse_back() {
    for workload in CATALOG {
        let label = workload.label().to_string();
        assert_eq!(label.parse::<Workload>().unwrap(), workload);
        assert_eq!(workload.name().parse::<Workload>().unwrap(), workload);
    }
}

#[test]
fn test_custom_workload_needs_an_image() {
    assert!(WorkloadSelection::resolve(Workload::Custom, None, None).is_err());
    let selection = WorkloadSelection::resolve(Workload::Custom, None, Some("redis:7")).unwrap();
    assert_eq!(selection.image(), "redis:7");
}
