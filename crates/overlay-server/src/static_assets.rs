//! Development-only static asset routes for override directories.
//!
//! Each stored override directory `d` exposes
//! `<project_path><d>_staticfiles/` under `/static/<d without '/'>/`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use overlay_core::OverrideRecord;
use overlay_storage::OverrideStore;

/// One `/static/<name>` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMount {
    pub prefix: String,
    pub root: PathBuf,
}

/// Mounts for `records`, one per distinct prefix, sorted by prefix.
///
/// The first record producing a prefix wins. A mount name must be non-empty
/// and made of ASCII alphanumerics, `_`, `.` or `-`; other directories are
/// skipped.
pub fn static_mounts(records: &[OverrideRecord], project_path: &str) -> Vec<StaticMount> {
    let mut mounts: BTreeMap<String, PathBuf> = BTreeMap::new();
    for record in records {
        let name = record.override_dir.replace('/', "");
        if !is_mount_name(&name) {
            tracing::warn!(override_dir = %record.override_dir, "override_dir cannot be mounted as a static path");
            continue;
        }
        let prefix = format!("/static/{name}");
        mounts.entry(prefix).or_insert_with(|| {
            PathBuf::from(format!("{project_path}{}_staticfiles/", record.override_dir))
        });
    }
    mounts
        .into_iter()
        .map(|(prefix, root)| StaticMount { prefix, root })
        .collect()
}

fn is_mount_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Read every override from `store` and compute its static mounts.
///
/// A store failure leaves the server without these routes rather than
/// failing startup.
pub async fn collect_static_mounts(store: &dyn OverrideStore, project_path: &str) -> Vec<StaticMount> {
    let records = match store.list_overrides().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list overrides, static asset routes not mounted");
            return Vec::new();
        }
    };

    let mounts = static_mounts(&records, project_path);
    for mount in &mounts {
        tracing::warn!(
            prefix = %mount.prefix,
            root = %mount.root.display(),
            "serving override static assets from the application server (debug mode only)"
        );
    }
    mounts
}
