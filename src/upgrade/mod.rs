//! Update evaluation and self-update for the `packup` binary.
//!
//! [`evaluate`] is the pure core of `outdated`: given the repository index
//! and the installed packages, it reports which packages have a newer
//! version available. The submodules handle the binary's own lifecycle:
//! release checking against GitHub, executable replacement, and release
//! notes.

pub mod exe_backup;
pub mod readme;
pub mod self_updater;
pub mod version_check;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::installed::{find_installed, InstalledPackage};
use crate::registry::PackageDescriptor;
use crate::version;

/// A pending update for one installed package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateInfo {
    pub slug: String,
    pub name: String,
    pub installed_version: String,
    pub new_version: String,
    pub package_url: String,
}

/// The result of checking installed packages against the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateReport {
    /// Packages with a strictly newer version in the repository.
    pub updatable: BTreeMap<String, UpdateInfo>,
    /// Installed packages already at (or past) the repository version.
    pub up_to_date: BTreeMap<String, String>,
    /// Total installed packages that matched an index entry.
    pub checked: usize,
}

impl UpdateReport {
    pub fn update_count(&self) -> usize {
        self.updatable.len()
    }
}

/// Match installed packages against repository descriptors.
///
/// An update is offered only when the repository version is strictly newer
/// than the installed one. Index entries with no matching install and
/// installs with no index entry are both ignored.
pub fn evaluate(available: &[PackageDescriptor], installed: &[InstalledPackage]) -> UpdateReport {
    let mut report = UpdateReport::default();

    for descriptor in available {
        let Some(pkg) = find_installed(installed, &descriptor.slug, &descriptor.name) else {
            continue;
        };
        report.checked += 1;

        if version::is_newer(&descriptor.version, &pkg.version) {
            report.updatable.insert(
                descriptor.slug.clone(),
                UpdateInfo {
                    slug: descriptor.slug.clone(),
                    name: descriptor.name.clone(),
                    installed_version: pkg.version.clone(),
                    new_version: descriptor.version.clone(),
                    package_url: descriptor.download_url.clone(),
                },
            );
        } else {
            report.up_to_date.insert(descriptor.slug.clone(), pkg.version.clone());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor(slug: &str, version: &str) -> PackageDescriptor {
        PackageDescriptor {
            slug: slug.to_string(),
            name: format!("{slug} name"),
            version: version.to_string(),
            download_url: format!("https://r.example.com/{slug}-{version}.zip"),
            description: None,
            changelog: None,
            info_url: None,
            checksum: None,
        }
    }

    fn installed(slug: &str, version: &str) -> InstalledPackage {
        InstalledPackage {
            slug: slug.to_string(),
            name: format!("{slug} name"),
            version: version.to_string(),
            file_path: PathBuf::from(slug).join("package.toml"),
        }
    }

    #[test]
    fn newer_repository_version_is_updatable() {
        let report = evaluate(&[descriptor("alpha", "2.0")], &[installed("alpha", "1.5")]);
        assert_eq!(report.update_count(), 1);
        let info = &report.updatable["alpha"];
        assert_eq!(info.installed_version, "1.5");
        assert_eq!(info.new_version, "2.0");
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn equal_versions_are_up_to_date() {
        let report = evaluate(&[descriptor("alpha", "2.0")], &[installed("alpha", "2.0")]);
        assert_eq!(report.update_count(), 0);
        assert_eq!(report.up_to_date["alpha"], "2.0");
    }

    #[test]
    fn newer_local_install_is_not_downgraded() {
        let report = evaluate(&[descriptor("alpha", "1.0")], &[installed("alpha", "2.0")]);
        assert_eq!(report.update_count(), 0);
        assert_eq!(report.up_to_date["alpha"], "2.0");
    }

    #[test]
    fn unmatched_entries_are_ignored() {
        let report = evaluate(
            &[descriptor("only-remote", "1.0")],
            &[installed("only-local", "1.0")],
        );
        assert_eq!(report.checked, 0);
        assert_eq!(report.update_count(), 0);
        assert!(report.up_to_date.is_empty());
    }

    #[test]
    fn mixed_index_reports_each_package_once() {
        let available = vec![
            descriptor("a", "2.0"),
            descriptor("b", "1.0"),
            descriptor("c", "3.1"),
        ];
        let local = vec![installed("a", "1.9"), installed("b", "1.0"), installed("c", "3.0")];
        let report = evaluate(&available, &local);

        assert_eq!(report.checked, 3);
        assert_eq!(report.update_count(), 2);
        assert!(report.updatable.contains_key("a"));
        assert!(report.updatable.contains_key("c"));
        assert_eq!(report.up_to_date["b"], "1.0");
    }
}
