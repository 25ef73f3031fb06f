// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installer backed by the HashiCorp releases site.
//!
//! Layout: `<base>/<v>/terraform_<v>_<os>_<arch>.zip` next to
//! `<base>/<v>/terraform_<v>_SHA256SUMS`.

use super::{executable_name, InstallerError, ToolInstaller};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_RELEASES_URL: &str = "https://releases.hashicorp.com/terraform";

/// Maximum download size (release archives are well under this).
const MAX_BODY_SIZE: u64 = 512 * 1024 * 1024;

#[derive(Clone)]
pub struct ReleasesInstaller {
    agent: ureq::Agent,
    base_url: String,
}

impl Default for ReleasesInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_RELEASES_URL)
    }
}

impl ReleasesInstaller {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, InstallerError> {
        let download = |message: String| InstallerError::Download {
            url: url.to_string(),
            message,
        };
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", "krecd")
            .call()
            .map_err(|e| download(e.to_string()))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| download(e.to_string()))
    }

    fn install_blocking(&self, version: &str, dir: &Path) -> Result<PathBuf, InstallerError> {
        let (os, arch) = platform(std::env::consts::OS, std::env::consts::ARCH)?;
        let archive_name = format!("terraform_{version}_{os}_{arch}.zip");
        let base = format!("{}/{}", self.base_url, version);

        let sums = self.fetch(&format!("{base}/terraform_{version}_SHA256SUMS"))?;
        let sums = String::from_utf8_lossy(&sums);
        let archive = self.fetch(&format!("{base}/{archive_name}"))?;

        verify_checksum(&sums, &archive_name, &archive)?;
        unpack(&archive, dir)
    }
}

#[async_trait]
impl ToolInstaller for ReleasesInstaller {
    async fn install(&self, version: &str, dir: &Path) -> Result<PathBuf, InstallerError> {
        let this = self.clone();
        let version = version.to_string();
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || this.install_blocking(&version, &dir))
            .await
            .map_err(|e| InstallerError::Task(e.to_string()))?
    }
}

/// Map Rust platform constants to release naming.
pub(crate) fn platform(
    os: &'static str,
    arch: &'static str,
) -> Result<(&'static str, &'static str), InstallerError> {
    let unsupported = || InstallerError::UnsupportedPlatform { os, arch };
    let os_name = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        "freebsd" => "freebsd",
        "openbsd" => "openbsd",
        _ => return Err(unsupported()),
    };
    let arch_name = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        _ => return Err(unsupported()),
    };
    Ok((os_name, arch_name))
}

/// Check `data` against its line in a `SHA256SUMS` listing.
pub(crate) fn verify_checksum(sums: &str, file: &str, data: &[u8]) -> Result<(), InstallerError> {
    let expected = sums
        .lines()
        .filter_map(|line| line.split_once(char::is_whitespace))
        .find(|(_, name)| name.trim_start_matches([' ', '*']) == file)
        .map(|(hash, _)| hash.to_ascii_lowercase())
        .ok_or_else(|| InstallerError::ChecksumMissing {
            file: file.to_string(),
        })?;

    let actual = format!("{:x}", Sha256::digest(data));
    if actual != expected {
        return Err(InstallerError::ChecksumMismatch {
            file: file.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Extract the terraform executable from a release zip into `dir`.
pub(crate) fn unpack(archive: &[u8], dir: &Path) -> Result<PathBuf, InstallerError> {
    let name = executable_name();
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| InstallerError::Archive(e.to_string()))?;

    let mut contents = Vec::new();
    let mut found = false;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| InstallerError::Archive(e.to_string()))?;
        if !entry.is_dir() && entry.name() == name {
            entry
                .read_to_end(&mut contents)
                .map_err(|e| InstallerError::Archive(e.to_string()))?;
            found = true;
            break;
        }
    }
    if !found {
        return Err(InstallerError::Archive(format!("{name} not found in archive")));
    }

    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source| InstallerError::Io { path, source }
    };
    std::fs::create_dir_all(dir).map_err(io(dir))?;

    // Write to a unique temporary file so a crash or a concurrent install
    // never leaves a truncated binary at the final path
    let path = dir.join(name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io(dir))?;
    tmp.write_all(&contents).map_err(io(tmp.path()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))
            .map_err(io(tmp.path()))?;
    }
    tmp.persist(&path).map_err(|e| InstallerError::Io {
        path: path.clone(),
        source: e.error,
    })?;
    Ok(path)
}

#[cfg(test)]
#[path = "releases_tests.rs"]
mod tests;
