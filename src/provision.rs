//! Writable-directory provisioning
//!
//! Applies the per-site permission policy to each writable directory of a
//! release. Directories that do not exist in the release are skipped: not
//! every site ships every conventional directory.

use anyhow::{Result, ensure};

use crate::catalog::{SiteConfig, WritableMode};
use crate::remote::{PathKind, RemoteCommand, RemoteExecutor};

/// Make the site's writable directories writable inside `release_path`
pub fn apply(
    executor: &dyn RemoteExecutor,
    release_path: &str,
    site: &SiteConfig,
    http_user: &str,
) -> Result<()> {
    for dir in &site.writable_dirs {
        let path = format!("{release_path}/{dir}");
        if !executor.exists(&path, PathKind::Dir)? {
            log::debug!("writable dir {path} absent, skipping");
            continue;
        }

        let cmd = permission_command(site, http_user, &path);
        let out = executor.run(&cmd)?;
        ensure!(
            out.success,
            "could not make {} writable: {}",
            path,
            out.stderr
        );
    }
    Ok(())
}

fn permission_command(site: &SiteConfig, http_user: &str, path: &str) -> RemoteCommand {
    let program = match site.writable_mode {
        WritableMode::Chmod => "chmod",
        WritableMode::Acl => "setfacl",
    };
    let mut cmd = if site.writable_use_sudo {
        RemoteCommand::new("sudo").arg(program)
    } else {
        RemoteCommand::new(program)
    };
    if site.writable_recursive {
        cmd = cmd.arg("-R");
    }
    cmd = match site.writable_mode {
        WritableMode::Chmod => cmd.arg(&site.writable_chmod_mode),
        WritableMode::Acl => cmd
            .arg("-m")
            .arg(format!("u:{http_user}:rwX"))
            .arg("-m")
            .arg(format!("d:u:{http_user}:rwX")),
    };
    cmd.arg(path)
}
