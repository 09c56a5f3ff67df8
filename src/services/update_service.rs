use std::path::{Path, PathBuf};

use crate::config::LauncherConfig;
use crate::errors::Result;
use crate::events::{LauncherEvent, StatusSink};
use crate::models::VersionDescriptor;
use crate::services::RemoteClient;
use crate::utils::file::FileManager;

const UPDATE_VERSION_FILE: &str = "update_version.json";
const FALLBACK_VERSION: &str = "0.0.0";

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateAction {
    UpToDate,
    UpdateAvailable,
}

/// Recomputed on every check, never persisted.
#[derive(Clone, Debug)]
pub struct UpdateDecision {
    pub local_version: String,
    pub remote_version: String,
    pub action: UpdateAction,
}

/// What the shell should do after the check: keep starting the installed
/// build, or exit immediately because a staged update is about to replace
/// it and relaunch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    LaunchExisting,
    Relaunching,
}

/// The version fields are compared for plain string equality, not semantic
/// ordering: any mismatch counts as an update, including a remote rollback
/// to a lexicographically earlier version (which this client will install).
pub fn decide(local_version: &str, remote_version: &str) -> UpdateDecision {
    let action = if local_version == remote_version {
        UpdateAction::UpToDate
    } else {
        UpdateAction::UpdateAvailable
    };
    UpdateDecision {
        local_version: local_version.to_string(),
        remote_version: remote_version.to_string(),
        action,
    }
}

fn with_cache_buster(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}t={}",
        url,
        separator,
        chrono::Utc::now().timestamp_millis()
    )
}

#[cfg(target_os = "windows")]
#[inline]
fn hide_console_window(command: &mut std::process::Command) {
    use std::os::windows::process::CommandExt;
    command.creation_flags(CREATE_NO_WINDOW);
}

/// Replaces the installed application when the remote version descriptor no
/// longer matches the local one. The running binary cannot delete itself,
/// so the file swap happens in a detached staging script after this process
/// exits; every failure before that point degrades to launching the build
/// already on disk.
#[derive(Clone)]
pub struct UpdateService {
    client: RemoteClient,
    files: FileManager,
    sink: StatusSink,
    version_url: String,
    bundle_url: String,
    app_version: String,
    packaged: bool,
}

impl UpdateService {
    pub fn new(
        client: RemoteClient,
        files: FileManager,
        sink: StatusSink,
        config: &LauncherConfig,
    ) -> Self {
        Self {
            client,
            files,
            sink,
            version_url: config.update_version_url.clone(),
            bundle_url: config.update_bundle_url.clone(),
            app_version: config.app_version.clone(),
            packaged: config.packaged,
        }
    }

    pub async fn check_and_apply(&self) -> UpdateOutcome {
        if !self.packaged {
            tracing::debug!("unpackaged build, skipping update check");
            return UpdateOutcome::LaunchExisting;
        }

        match self.run_check().await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("update check failed: {}", err);
                self.narrate("Update check failed. Starting anyway...");
                UpdateOutcome::LaunchExisting
            }
        }
    }

    async fn run_check(&self) -> Result<UpdateOutcome> {
        self.narrate("Checking for updates...");

        let remote: VersionDescriptor = self
            .client
            .get_json(&with_cache_buster(&self.version_url))
            .await?;
        let local_version = self.read_or_seed_local_version();
        let decision = decide(&local_version, &remote.version);
        tracing::info!(
            "local version: {}, remote version: {}",
            decision.local_version,
            decision.remote_version
        );

        match decision.action {
            UpdateAction::UpToDate => {
                tracing::info!("launcher is up to date");
                Ok(UpdateOutcome::LaunchExisting)
            }
            UpdateAction::UpdateAvailable => {
                self.narrate(&format!("Update to v{} available.", remote.version));
                self.download_and_stage(&remote.version).await?;
                Ok(UpdateOutcome::Relaunching)
            }
        }
    }

    fn local_version_path(&self) -> PathBuf {
        self.files.app_data_dir().join(UPDATE_VERSION_FILE)
    }

    /// Missing descriptor: seeded with the running build's version, so the
    /// very first check compares equal. Corrupt descriptor: falls back to
    /// "0.0.0", which forces an update.
    fn read_or_seed_local_version(&self) -> String {
        let path = self.local_version_path();
        if path.exists() {
            return match self.files.load_json::<VersionDescriptor>(&path) {
                Some(descriptor) => descriptor.version,
                None => FALLBACK_VERSION.to_string(),
            };
        }

        let seed = VersionDescriptor {
            version: self.app_version.clone(),
        };
        match serde_json::to_vec_pretty(&seed)
            .map_err(crate::errors::LauncherError::from)
            .and_then(|bytes| self.files.write_atomic(&path, &bytes).map_err(Into::into))
        {
            Ok(()) => self.app_version.clone(),
            Err(err) => {
                tracing::error!("could not seed local version descriptor: {}", err);
                self.app_version.clone()
            }
        }
    }

    async fn download_and_stage(&self, new_version: &str) -> Result<()> {
        self.narrate("Downloading update...");

        let archive_path = std::env::temp_dir().join("aurora-launcher-update.zip");
        let mut last_percent: i64 = -1;
        let sink = self.sink.clone();
        self.client
            .download_to_file(&self.bundle_url, &archive_path, move |downloaded, total| {
                if let Some(total) = total.filter(|value| *value > 0) {
                    let percent = ((downloaded as f64 / total as f64) * 100.0).round() as i64;
                    if percent != last_percent {
                        last_percent = percent;
                        sink.emit(LauncherEvent::UpdateMessage {
                            message: format!("Downloading... {}%", percent),
                        });
                    }
                }
            })
            .await?;

        self.narrate("Installing update...");
        self.spawn_stage_script(new_version, &archive_path)?;
        // The caller exits now; the staging script takes over once the file
        // locks are gone.
        Ok(())
    }

    fn spawn_stage_script(&self, new_version: &str, archive_path: &Path) -> Result<()> {
        let install_dir = self.files.install_dir().to_path_buf();
        let version_path = self.local_version_path();
        let exe_name = resolve_exe_name();
        let stamp = chrono::Utc::now().timestamp_millis();

        #[cfg(target_os = "windows")]
        {
            let batch_path = std::env::temp_dir().join(format!("aurora-updater-{stamp}.bat"));
            let vbs_path = std::env::temp_dir().join(format!("aurora-updater-{stamp}.vbs"));
            let batch = build_windows_stage_script(
                &install_dir,
                archive_path,
                &version_path,
                &exe_name,
                new_version,
                &vbs_path,
            );
            std::fs::write(&batch_path, batch)?;

            // ShellExecute with the "runas" verb raises the elevation prompt
            // the install directory may require.
            let vbs = format!(
                "Set objShell = CreateObject(\"Shell.Application\")\r\n\
                 objShell.ShellExecute \"cmd.exe\", \"/c \"\"{}\"\"\", \"\", \"runas\", 0",
                batch_path.display()
            );
            std::fs::write(&vbs_path, vbs)?;

            let mut command = std::process::Command::new("cscript.exe");
            command.arg(&vbs_path);
            hide_console_window(&mut command);
            command.spawn()?;
        }

        #[cfg(not(target_os = "windows"))]
        {
            let script_path = std::env::temp_dir().join(format!("aurora-updater-{stamp}.sh"));
            let script = build_unix_stage_script(
                &install_dir,
                archive_path,
                &version_path,
                &exe_name,
                new_version,
            );
            std::fs::write(&script_path, script)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))?;
            }

            std::process::Command::new("sh").arg(&script_path).spawn()?;
        }

        Ok(())
    }

    fn narrate(&self, message: &str) {
        self.sink.emit(LauncherEvent::UpdateMessage {
            message: message.to_string(),
        });
    }
}

fn resolve_exe_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|name| name.to_string_lossy().to_string()))
        .unwrap_or_else(|| {
            if cfg!(target_os = "windows") {
                "aurora-launcher.exe".to_string()
            } else {
                "aurora-launcher".to_string()
            }
        })
}

#[cfg(target_os = "windows")]
fn build_windows_stage_script(
    install_dir: &Path,
    archive_path: &Path,
    version_path: &Path,
    exe_name: &str,
    new_version: &str,
    vbs_path: &Path,
) -> String {
    [
        "@echo off".to_string(),
        format!("taskkill /F /IM \"{exe_name}\" /T > nul 2>&1"),
        // Silent five second wait for file-handle release.
        "ping 127.0.0.1 -n 6 > nul".to_string(),
        format!("pushd \"{}\"", install_dir.display()),
        "for /d %%i in (*) do rmdir /s /q \"%%i\" 2>nul".to_string(),
        "for %%i in (*.*) do del /f /q \"%%i\" 2>nul".to_string(),
        "popd".to_string(),
        format!(
            "powershell -WindowStyle Hidden -ExecutionPolicy Bypass -command \"Expand-Archive -Path '{}' -DestinationPath '{}' -Force\"",
            archive_path.display(),
            install_dir.display()
        ),
        format!(
            "echo {{\"version\":\"{new_version}\"}} > \"{}\"",
            version_path.display()
        ),
        format!("start \"\" \"{}\"", install_dir.join(exe_name).display()),
        format!("del \"{}\"", archive_path.display()),
        format!("del \"{}\"", vbs_path.display()),
        "(goto) 2>nul & del \"%~f0\"".to_string(),
    ]
    .join("\r\n")
}

#[cfg(not(target_os = "windows"))]
fn build_unix_stage_script(
    install_dir: &Path,
    archive_path: &Path,
    version_path: &Path,
    exe_name: &str,
    new_version: &str,
) -> String {
    format!(
        "#!/bin/sh\n\
         pkill -f \"{exe}\" > /dev/null 2>&1\n\
         sleep 5\n\
         rm -rf \"{install}\"/*\n\
         unzip -o \"{archive}\" -d \"{install}\" > /dev/null 2>&1\n\
         printf '{{\"version\":\"%s\"}}' \"{version}\" > \"{version_file}\"\n\
         \"{install}/{exe}\" > /dev/null 2>&1 &\n\
         rm -f \"{archive}\"\n\
         rm -f \"$0\"\n",
        exe = exe_name,
        install = install_dir.display(),
        archive = archive_path.display(),
        version = new_version,
        version_file = version_path.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::discard_sink;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_data_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aurora-update-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp data directory");
        dir
    }

    fn config_for(dir: &PathBuf, packaged: bool) -> LauncherConfig {
        LauncherConfig {
            data_dir: dir.clone(),
            install_dir: dir.join("install"),
            catalog_version_url: String::new(),
            catalog_data_url: String::new(),
            // Unroutable endpoint: any fetch attempt fails fast.
            update_version_url: "http://127.0.0.1:1/launcher_version.json".to_string(),
            update_bundle_url: "http://127.0.0.1:1/aurora-launcher.zip".to_string(),
            manifest_url: String::new(),
            app_version: "1.2.0".to_string(),
            packaged,
        }
    }

    fn service_for(dir: &PathBuf, packaged: bool) -> UpdateService {
        let config = config_for(dir, packaged);
        UpdateService::new(
            RemoteClient::new(),
            FileManager::new(dir.clone(), dir.join("install")),
            discard_sink(),
            &config,
        )
    }

    #[test]
    fn matching_versions_are_up_to_date() {
        let decision = decide("1.0.0", "1.0.0");
        assert_eq!(decision.action, UpdateAction::UpToDate);
    }

    #[test]
    fn any_mismatch_is_an_update() {
        assert_eq!(
            decide("1.0.0", "1.0.1").action,
            UpdateAction::UpdateAvailable
        );
        // A remote rollback also counts as an update; string comparison has
        // no ordering.
        assert_eq!(
            decide("1.0.1", "1.0.0").action,
            UpdateAction::UpdateAvailable
        );
    }

    #[test]
    fn missing_local_descriptor_is_seeded_with_app_version() {
        let dir = temp_data_dir();
        let service = service_for(&dir, true);

        assert_eq!(service.read_or_seed_local_version(), "1.2.0");
        // The seed is persisted, so the next read goes through the file.
        assert!(dir.join(UPDATE_VERSION_FILE).exists());
        assert_eq!(service.read_or_seed_local_version(), "1.2.0");
    }

    #[test]
    fn corrupt_local_descriptor_defaults_to_zero_version() {
        let dir = temp_data_dir();
        let service = service_for(&dir, true);
        std::fs::write(dir.join(UPDATE_VERSION_FILE), "{broken").expect("write descriptor");

        assert_eq!(service.read_or_seed_local_version(), FALLBACK_VERSION);
    }

    #[tokio::test]
    async fn unpackaged_build_skips_the_check() {
        let dir = temp_data_dir();
        let service = service_for(&dir, false);

        assert_eq!(
            service.check_and_apply().await,
            UpdateOutcome::LaunchExisting
        );
        // Skipped entirely: not even the seed file is written.
        assert!(!dir.join(UPDATE_VERSION_FILE).exists());
    }

    #[tokio::test]
    async fn network_failure_falls_back_to_existing_install() {
        let dir = temp_data_dir();
        let service = service_for(&dir, true);

        assert_eq!(
            service.check_and_apply().await,
            UpdateOutcome::LaunchExisting
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn stage_script_replaces_install_dir_and_relaunches() {
        let script = build_unix_stage_script(
            Path::new("/opt/aurora"),
            Path::new("/tmp/aurora-launcher-update.zip"),
            Path::new("/home/user/.local/share/aurora-launcher/update_version.json"),
            "aurora-launcher",
            "2.0.0",
        );

        assert!(script.contains("rm -rf \"/opt/aurora\"/*"));
        assert!(script.contains("unzip -o \"/tmp/aurora-launcher-update.zip\" -d \"/opt/aurora\""));
        assert!(script.contains("2.0.0"));
        assert!(script.contains("\"/opt/aurora/aurora-launcher\""));
        assert!(script.contains("rm -f \"$0\""));
    }
}
