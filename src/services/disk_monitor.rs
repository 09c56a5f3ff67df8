use std::path::{Path, PathBuf};
use std::time::Duration;

use sysinfo::Disks;
use tokio::task::JoinHandle;

/// Active transfers pause once the destination volume drops under this.
pub const LOW_SPACE_THRESHOLD_BYTES: u64 = 200 * 1024 * 1024;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub fn is_low_space(free_bytes: u64) -> bool {
    free_bytes < LOW_SPACE_THRESHOLD_BYTES
}

fn nearest_existing_path(path: &Path) -> PathBuf {
    let mut candidate = path.to_path_buf();
    while !candidate.exists() {
        if !candidate.pop() {
            return PathBuf::from(".");
        }
    }
    candidate
}

/// Free space on the volume backing `path`, chosen by the longest matching
/// mount point. `None` means the platform or path offers no free-space
/// introspection; callers skip the check silently in that case.
pub fn available_disk_space(path: &Path) -> Option<u64> {
    let target = nearest_existing_path(path);
    let target = std::fs::canonicalize(&target).unwrap_or(target);
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if target.starts_with(mount) {
            let score = mount.as_os_str().to_string_lossy().len();
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, disk.available_space())),
            }
        }
    }

    best.map(|(_, available)| available)
}

/// Handle to the recurring free-space poll attached to the active transfer.
/// Dropped (stopped) exactly when no transfer is active.
pub struct DiskSpaceMonitor {
    task: JoinHandle<()>,
}

impl DiskSpaceMonitor {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_200_mib() {
        assert!(is_low_space(0));
        assert!(is_low_space(200 * 1024 * 1024 - 1));
        assert!(!is_low_space(200 * 1024 * 1024));
        assert!(!is_low_space(u64::MAX));
    }

    #[test]
    fn nearest_existing_path_walks_up_to_a_real_ancestor() {
        let temp = std::env::temp_dir();
        let missing = temp.join("aurora-does-not-exist").join("deeper");
        let nearest = nearest_existing_path(&missing);
        assert!(nearest.exists());
        assert!(temp.starts_with(&nearest) || nearest == temp);
    }
}
