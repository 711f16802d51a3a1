//! Dependency fetching
//!
//! A [`Fetcher`] turns a [`DependencyDescriptor`] into the command lines for
//! its source kind, runs them through a [`CommandRunner`], then runs the
//! descriptor's post-fetch hooks. Every kind shares the same contract: exit
//! code 0 is success, anything else aborts with the failing command.
//!
//! A source tree counts as present only once every command and hook has
//! succeeded. While a fetch runs, a `.<name>.pending` marker sits next to
//! the target; a tree left behind with its marker is removed and fetched
//! again.

use crate::descriptor::{DependencyDescriptor, FetchSource, GitReference};
use crate::runner::{CommandRunner, ShellCommand, SystemRunner};
use crate::{FetchError, FetchResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a successful fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing to do: the install check passed or the tree is already on disk
    AlreadyPresent,
    /// Retrieved (and post-fetch hooks ran)
    Fetched,
}

/// Capability to materialize a dependency into a directory
pub trait Fetch {
    fn fetch(&self, descriptor: &DependencyDescriptor, target: &Path) -> FetchResult<FetchOutcome>;
}

/// Command-line based fetcher
#[derive(Debug, Clone, Default)]
pub struct Fetcher<R = SystemRunner> {
    runner: R,
}

impl Fetcher<SystemRunner> {
    /// Fetcher backed by real subprocesses
    pub fn system() -> Self {
        Self::new(SystemRunner)
    }
}

impl<R: CommandRunner> Fetcher<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Whether the dependency needs no fetch
    pub fn is_present(&self, descriptor: &DependencyDescriptor, target: &Path) -> FetchResult<bool> {
        if let Some(check) = &descriptor.install_check {
            let output = self.runner.run(&ShellCommand::shell(check.as_str()))?;
            debug!(
                dependency = %descriptor.name,
                exit_code = output.exit_code,
                "install check"
            );
            return Ok(output.success());
        }

        if descriptor.source.is_source_tree() {
            if pending_marker(target).is_some_and(|marker| marker.exists()) {
                return Ok(false);
            }
            return match fs::read_dir(target) {
                Ok(mut entries) => Ok(entries.next().is_some()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(FetchError::io(target, e)),
            };
        }

        Ok(false)
    }

    /// The retrieval commands for a descriptor, in execution order
    pub fn fetch_commands(descriptor: &DependencyDescriptor, target: &Path) -> Vec<ShellCommand> {
        match &descriptor.source {
            FetchSource::Git { url, reference } => {
                let mut clone = ShellCommand::new("git")
                    .arg("clone")
                    .env("GIT_TERMINAL_PROMPT", "0");
                match reference {
                    Some(GitReference::Branch(name)) | Some(GitReference::Tag(name)) => {
                        clone = clone.arg("--branch").arg(name.as_str());
                    }
                    Some(GitReference::Rev(_)) | None => {}
                }
                let clone = clone.arg(url.as_str()).path_arg(target);

                match reference {
                    Some(GitReference::Rev(rev)) => vec![
                        clone,
                        ShellCommand::new("git")
                            .arg("-C")
                            .path_arg(target)
                            .arg("checkout")
                            .arg("--quiet")
                            .arg(rev.as_str()),
                    ],
                    _ => vec![clone],
                }
            }
            FetchSource::Mercurial { url, rev } => {
                let mut clone = ShellCommand::new("hg").arg("clone");
                if let Some(rev) = rev {
                    clone = clone.arg("-r").arg(rev.as_str());
                }
                vec![clone.arg(url.as_str()).path_arg(target)]
            }
            FetchSource::Subversion { url, rev } => {
                let mut checkout = ShellCommand::new("svn").arg("checkout").arg("--quiet");
                if let Some(rev) = rev {
                    checkout = checkout.arg("-r").arg(rev.as_str());
                }
                vec![checkout.arg(url.as_str()).path_arg(target)]
            }
            FetchSource::Download { url } => {
                let archive = target.join(download_file_name(url));
                let download = ShellCommand::new("curl")
                    .arg("-fsSL")
                    .arg("-o")
                    .path_arg(&archive)
                    .arg(url.as_str());
                match ArchiveKind::detect(url) {
                    Some(ArchiveKind::Tar) => vec![
                        download,
                        ShellCommand::new("tar")
                            .arg("-xf")
                            .path_arg(&archive)
                            .arg("-C")
                            .path_arg(target)
                            .arg("--strip-components=1"),
                    ],
                    Some(ArchiveKind::Zip) => vec![
                        download,
                        ShellCommand::new("unzip")
                            .arg("-q")
                            .path_arg(&archive)
                            .arg("-d")
                            .path_arg(target),
                    ],
                    None => vec![download],
                }
            }
            FetchSource::System { package, manager } => {
                let (program, args) = manager.install_command(package);
                vec![ShellCommand::new(program).args(args)]
            }
        }
    }

    fn prepare_target(descriptor: &DependencyDescriptor, target: &Path) -> FetchResult<()> {
        let dir: PathBuf = match descriptor.source {
            // Clones create the target themselves; only the parent must exist
            FetchSource::Git { .. } | FetchSource::Mercurial { .. } | FetchSource::Subversion { .. } => {
                match target.parent() {
                    Some(parent) => parent.to_path_buf(),
                    None => return Ok(()),
                }
            }
            FetchSource::Download { .. } | FetchSource::System { .. } => target.to_path_buf(),
        };
        fs::create_dir_all(&dir).map_err(|e| FetchError::io(&dir, e))
    }

    fn run_hooks(&self, descriptor: &DependencyDescriptor, target: &Path) -> FetchResult<()> {
        for hook in &descriptor.post_fetch {
            let command = ShellCommand::shell(hook.as_str()).current_dir(target);
            info!(dependency = %descriptor.name, command = %hook, "running post-fetch command");
            let output = self.runner.run(&command)?;
            if !output.success() {
                return Err(FetchError::HookFailed {
                    command: hook.clone(),
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                });
            }
        }
        Ok(())
    }
}

impl<R: CommandRunner> Fetch for Fetcher<R> {
    fn fetch(&self, descriptor: &DependencyDescriptor, target: &Path) -> FetchResult<FetchOutcome> {
        if self.is_present(descriptor, target)? {
            debug!(dependency = %descriptor.name, "already present");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        info!(
            dependency = %descriptor.name,
            source = descriptor.source.kind_name(),
            location = descriptor.source.location(),
            "fetching"
        );
        let marker = if descriptor.source.is_source_tree() {
            pending_marker(target)
        } else {
            None
        };
        if let Some(marker) = &marker {
            if marker.exists() && target.exists() {
                warn!(
                    dependency = %descriptor.name,
                    path = %target.display(),
                    "removing incomplete checkout from an earlier fetch"
                );
                fs::remove_dir_all(target).map_err(|e| FetchError::io(target, e))?;
            }
        }
        Self::prepare_target(descriptor, target)?;
        if let Some(marker) = &marker {
            fs::write(marker, descriptor.source.location()).map_err(|e| FetchError::io(marker, e))?;
        }

        for command in Self::fetch_commands(descriptor, target) {
            self.runner.run_checked(&command)?;
        }

        if let FetchSource::Download { url } = &descriptor.source {
            if ArchiveKind::detect(url).is_some() {
                let archive = target.join(download_file_name(url));
                if archive.exists() {
                    fs::remove_file(&archive).map_err(|e| FetchError::io(&archive, e))?;
                }
            }
        }

        self.run_hooks(descriptor, target)?;
        if let Some(marker) = &marker {
            fs::remove_file(marker).map_err(|e| FetchError::io(marker, e))?;
        }
        Ok(FetchOutcome::Fetched)
    }
}

/// Marker next to `target` while its fetch is incomplete
fn pending_marker(target: &Path) -> Option<PathBuf> {
    let name = target.file_name()?;
    let parent = target.parent()?;
    Some(parent.join(format!(".{}.pending", name.to_string_lossy())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Tar,
    Zip,
}

impl ArchiveKind {
    fn detect(url: &str) -> Option<Self> {
        let name = download_file_name(url);
        if [".tar.gz", ".tgz", ".tar.xz", ".tar.bz2", ".tar"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Last path segment of a URL, without query string
fn download_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() && !name.contains(':') => name.to_string(),
        _ => "download".to_string(),
    }
}
