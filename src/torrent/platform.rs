use std::path::{Path, PathBuf};

use crate::error::DownloadError;

/// Everything needed to launch the torrent client helper on this platform.
#[derive(Debug, Clone)]
pub struct ClientProcessDescriptor {
    pub executable: PathBuf,
    /// Directory holding the helper's bundled dynamic libraries.
    pub library_dir: PathBuf,
    /// Environment variable the dynamic linker reads, when the platform has one.
    pub library_path_var: Option<&'static str>,
}

/// Resolves the helper binary under `<assets_dir>/torrent-client/<platform>/`.
/// Only Windows, 64-bit macOS and 64-bit Linux ship a helper; anything else is
/// a hard launch failure.
pub fn client_process_descriptor(
    assets_dir: &Path,
) -> Result<ClientProcessDescriptor, DownloadError> {
    if cfg!(target_os = "windows") {
        let dir = assets_dir.join("torrent-client/win");
        Ok(ClientProcessDescriptor {
            executable: dir.join("torrent-client.exe"),
            library_dir: dir,
            library_path_var: None,
        })
    } else if cfg!(target_os = "macos") && cfg!(target_pointer_width = "64") {
        let dir = assets_dir.join("torrent-client/osx64");
        Ok(ClientProcessDescriptor {
            executable: dir.join("torrent-client"),
            library_dir: dir,
            library_path_var: Some("DYLD_LIBRARY_PATH"),
        })
    } else if cfg!(target_os = "linux") && cfg!(target_pointer_width = "64") {
        let dir = assets_dir.join("torrent-client/linux64");
        Ok(ClientProcessDescriptor {
            executable: dir.join("torrent-client"),
            library_dir: dir,
            library_path_var: Some("LD_LIBRARY_PATH"),
        })
    } else {
        Err(DownloadError::UnsupportedPlatform)
    }
}

/// Sets the executable bit before first launch; the helper ships without it on
/// some install channels.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<(), DownloadError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    if permissions.mode() & 0o111 != 0o111 {
        permissions.set_mode(permissions.mode() | 0o111);
        std::fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) -> Result<(), DownloadError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn resolves_linux_helper_with_library_path() {
        let descriptor = client_process_descriptor(Path::new("/opt/assets")).unwrap();
        assert_eq!(
            descriptor.executable,
            PathBuf::from("/opt/assets/torrent-client/linux64/torrent-client")
        );
        assert_eq!(descriptor.library_path_var, Some("LD_LIBRARY_PATH"));
    }

    #[cfg(unix)]
    #[test]
    fn ensure_executable_sets_the_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("helper");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
