//! The release pipeline
//!
//! A deployment is a fixed, ordered list of stages run against one host for
//! one resolved site. The list is a static table of named handlers, so the
//! sequence is verifiable at compile time instead of living in a
//! string-keyed task registry. The first failing stage aborts the run; the
//! live `current` symlink only moves in the `symlink` stage, so an aborted
//! run never affects traffic.

use anyhow::{Context as AnyhowContext, Result, ensure};
use chrono::Utc;

use crate::catalog::SiteConfig;
use crate::config::Settings;
use crate::error::Error;
use crate::host::HostTarget;
use crate::provision;
use crate::remote::{ExecOutput, PathKind, RemoteCommand, RemoteExecutor};
use crate::resolve::{self, ResolvedSite};
use crate::ui;

/// Options for a pipeline run
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Remove a stale lock before the sequence starts
    pub unlock_first: bool,
}

/// Outcome of a batch run over several sites
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub deployed: Vec<String>,
    pub failed: Vec<(String, Error)>,
    /// Sites never attempted because an earlier failure stopped the batch
    pub skipped: Vec<String>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Stage {
    name: &'static str,
    run: fn(&mut StageContext) -> Result<()>,
}

/// Canonical stage order; `symlink` is the point of no return.
const STAGES: &[Stage] = &[
    Stage { name: "info", run: info },
    Stage { name: "setup", run: setup },
    Stage { name: "check_remote", run: check_remote },
    Stage { name: "lock", run: lock },
    Stage { name: "release", run: release },
    Stage { name: "update_code", run: update_code },
    Stage { name: "initial_actions", run: initial_actions },
    Stage { name: "env", run: env },
    Stage { name: "shared", run: shared },
    Stage { name: "writable", run: writable },
    Stage { name: "vendors", run: vendors },
    Stage { name: "assets", run: assets },
    Stage { name: "final_actions", run: final_actions },
    Stage { name: "symlink", run: symlink },
    Stage { name: "unlock", run: unlock },
    Stage { name: "cleanup", run: cleanup },
    Stage { name: "cache_reset", run: cache_reset },
    Stage { name: "success_actions", run: success_actions },
    Stage { name: "success", run: success },
];

/// Per-run state threaded through the stages; no ambient globals
struct StageContext<'a> {
    executor: &'a dyn RemoteExecutor,
    host: &'a HostTarget,
    settings: &'a Settings,
    resolved: &'a ResolvedSite,
    /// Set by the `release` stage
    release_path: Option<String>,
    release_id: u64,
}

impl StageContext<'_> {
    fn site(&self) -> &SiteConfig {
        &self.resolved.site
    }

    fn release_path(&self) -> Result<&str> {
        self.release_path
            .as_deref()
            .context("release stage has not run")
    }

    /// Run a command and require a zero exit
    fn run_ok(&self, cmd: &RemoteCommand) -> Result<ExecOutput> {
        let out = self.executor.run(cmd)?;
        ensure!(out.success, "`{cmd}` failed: {}", out.stderr);
        Ok(out)
    }

    /// Run the optional hook script at `.deploy/<name>.sh`, if present
    fn run_hook(&self, name: &str) -> Result<()> {
        let release = self.release_path()?;
        let script = format!("{release}/.deploy/{name}.sh");
        if !self.executor.exists(&script, PathKind::File)? {
            log::debug!("hook {script} absent, skipping");
            return Ok(());
        }
        self.run_ok(&RemoteCommand::new("sh").arg(&script).cwd(release))?;
        Ok(())
    }
}

/// Deploy one resolved site to one host, fail-fast
pub fn run(
    executor: &dyn RemoteExecutor,
    host: &HostTarget,
    settings: &Settings,
    resolved: &ResolvedSite,
    opts: &DeployOptions,
) -> crate::error::Result<()> {
    let mut ctx = StageContext {
        executor,
        host,
        settings,
        resolved,
        release_path: None,
        release_id: 0,
    };

    let stage_error = |stage: &'static str, cause: anyhow::Error| Error::Stage {
        stage,
        site: resolved.site.name.clone(),
        host: host.label.clone(),
        cause,
    };

    if opts.unlock_first {
        remove_lock(&ctx).map_err(|cause| stage_error("unlock", cause))?;
    }

    for (num, stage) in STAGES.iter().enumerate() {
        ui::stage(num + 1, STAGES.len(), stage.name);
        (stage.run)(&mut ctx).map_err(|cause| stage_error(stage.name, cause))?;
    }
    Ok(())
}

/// Deploy several sites sequentially against one host.
///
/// The reference behavior stops the whole batch at the first failing site;
/// `keep_going` makes that explicit and optional.
pub fn run_batch(
    executor: &dyn RemoteExecutor,
    host: &HostTarget,
    settings: &Settings,
    sites: &[&SiteConfig],
    opts: &DeployOptions,
    keep_going: bool,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (idx, site) in sites.iter().enumerate() {
        let result = deploy_one(executor, host, settings, site, opts);
        match result {
            Ok(()) => outcome.deployed.push(site.name.clone()),
            Err(err) => {
                ui::error(&err.to_string());
                outcome.failed.push((site.name.clone(), err));
                if !keep_going {
                    outcome
                        .skipped
                        .extend(sites[idx + 1..].iter().map(|s| s.name.clone()));
                    break;
                }
            }
        }
    }
    outcome
}

/// Validate, resolve, and run the pipeline for one site
pub fn deploy_one(
    executor: &dyn RemoteExecutor,
    host: &HostTarget,
    settings: &Settings,
    site: &SiteConfig,
    opts: &DeployOptions,
) -> crate::error::Result<()> {
    site.validate()?;
    let resolved = resolve::resolve(site, settings, executor).map_err(|cause| Error::Stage {
        stage: "resolve",
        site: site.name.clone(),
        host: host.label.clone(),
        cause,
    })?;
    run(executor, host, settings, &resolved, opts)
}

// ============================================================================
// Stages
// ============================================================================

fn info(ctx: &mut StageContext) -> Result<()> {
    let site = ctx.site();
    ui::header(&format!("Deploying {} to {}", site.name, ctx.host.label));
    ui::kv("repository", &format!("{} ({})", site.repository, site.branch));
    ui::kv("deploy path", &ctx.resolved.deploy_path);
    ui::kv("shared files", &ctx.resolved.shared_files.join(", "));
    ui::kv("shared dirs", &ctx.resolved.shared_dirs.join(", "));
    Ok(())
}

fn setup(ctx: &mut StageContext) -> Result<()> {
    let deploy = &ctx.resolved.deploy_path;
    ctx.run_ok(
        &RemoteCommand::new("mkdir")
            .arg("-p")
            .arg(deploy)
            .arg(ctx.resolved.releases_root())
            .arg(ctx.resolved.shared_root())
            .arg(format!("{deploy}/.dep")),
    )?;
    Ok(())
}

fn check_remote(ctx: &mut StageContext) -> Result<()> {
    let site = ctx.site();
    let out = ctx.run_ok(
        &RemoteCommand::new("git")
            .args(["ls-remote", "--heads"])
            .arg(&site.repository)
            .arg(&site.branch),
    )?;
    ensure!(
        !out.stdout.trim().is_empty(),
        "branch '{}' not found in {}",
        site.branch,
        site.repository
    );
    Ok(())
}

fn lock(ctx: &mut StageContext) -> Result<()> {
    // mkdir is atomic: a second concurrent (or aborted) deploy fails here.
    let lock_dir = lock_path(ctx.resolved);
    let out = ctx.executor.run(&RemoteCommand::new("mkdir").arg(&lock_dir))?;
    ensure!(
        out.success,
        "deploy locked ({lock_dir} exists); if no deploy is running, re-run with --unlock"
    );
    Ok(())
}

fn release(ctx: &mut StageContext) -> Result<()> {
    let next = next_release_id(ctx.executor, &ctx.resolved.releases_root())?;
    let path = format!("{}/{next}", ctx.resolved.releases_root());
    ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(&path))?;

    // Release journal, one line per release.
    let journal = format!("{}/.dep/releases.log", ctx.resolved.deploy_path);
    let entry = format!("{} {next}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
    ctx.run_ok(
        &RemoteCommand::new("sh")
            .arg("-c")
            .arg(format!("echo '{entry}' >> {journal}")),
    )?;

    ctx.release_id = next;
    ctx.release_path = Some(path);
    Ok(())
}

fn update_code(ctx: &mut StageContext) -> Result<()> {
    let site = ctx.site();
    ctx.run_ok(
        &RemoteCommand::new("git")
            .arg("clone")
            .args(["--branch", &site.branch])
            .args(["--single-branch", "--depth", "1"])
            .arg(&site.repository)
            .arg(ctx.release_path()?),
    )?;
    Ok(())
}

fn initial_actions(ctx: &mut StageContext) -> Result<()> {
    ctx.run_hook("initial")
}

fn env(ctx: &mut StageContext) -> Result<()> {
    // When `.env` is a resolved shared file the shared stage links it.
    if ctx.resolved.shared_files.iter().any(|f| f == ".env") {
        return Ok(());
    }
    let source = format!("{}/.env", ctx.resolved.shared_root());
    if ctx.executor.exists(&source, PathKind::File)? {
        let target = format!("{}/.env", ctx.release_path()?);
        ctx.run_ok(&RemoteCommand::new("ln").arg("-sfn").arg(&source).arg(&target))?;
    }
    Ok(())
}

fn shared(ctx: &mut StageContext) -> Result<()> {
    let release = ctx.release_path()?.to_string();
    let shared_root = ctx.resolved.shared_root();

    for dir in &ctx.resolved.shared_dirs {
        let shared = format!("{shared_root}/{dir}");
        let in_release = format!("{release}/{dir}");

        // Seed the shared area from the release on first deploy; existing
        // shared content is never overwritten.
        if !ctx.executor.exists(&shared, PathKind::Dir)? {
            if let Some(parent) = parent_dir(&shared) {
                ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(parent))?;
            }
            if ctx.executor.exists(&in_release, PathKind::Dir)? {
                ctx.run_ok(&RemoteCommand::new("cp").arg("-a").arg(&in_release).arg(&shared))?;
            } else {
                ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(&shared))?;
            }
        }

        ctx.run_ok(&RemoteCommand::new("rm").arg("-rf").arg(&in_release))?;
        if let Some(parent) = parent_dir(&in_release) {
            ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(parent))?;
        }
        ctx.run_ok(&RemoteCommand::new("ln").arg("-sfn").arg(&shared).arg(&in_release))?;
    }

    for file in &ctx.resolved.shared_files {
        let shared = format!("{shared_root}/{file}");
        let in_release = format!("{release}/{file}");

        if let Some(parent) = parent_dir(&shared) {
            ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(parent))?;
        }
        if !ctx.executor.exists(&shared, PathKind::File)? {
            if ctx.executor.exists(&in_release, PathKind::File)? {
                ctx.run_ok(&RemoteCommand::new("cp").arg(&in_release).arg(&shared))?;
            } else {
                ctx.run_ok(&RemoteCommand::new("touch").arg(&shared))?;
            }
        }

        ctx.run_ok(&RemoteCommand::new("rm").arg("-f").arg(&in_release))?;
        if let Some(parent) = parent_dir(&in_release) {
            ctx.run_ok(&RemoteCommand::new("mkdir").arg("-p").arg(parent))?;
        }
        ctx.run_ok(&RemoteCommand::new("ln").arg("-sfn").arg(&shared).arg(&in_release))?;
    }
    Ok(())
}

fn writable(ctx: &mut StageContext) -> Result<()> {
    provision::apply(
        ctx.executor,
        ctx.release_path()?,
        ctx.site(),
        &ctx.settings.http_user,
    )
}

fn vendors(ctx: &mut StageContext) -> Result<()> {
    let release = ctx.release_path()?.to_string();
    if !ctx
        .executor
        .exists(&format!("{release}/composer.json"), PathKind::File)?
    {
        log::debug!("no composer.json, skipping vendors");
        return Ok(());
    }
    ctx.run_ok(
        &RemoteCommand::new("composer")
            .arg("install")
            .args([
                "--no-dev",
                "--prefer-dist",
                "--no-interaction",
                "--no-progress",
                "--optimize-autoloader",
            ])
            .cwd(&release),
    )?;
    Ok(())
}

fn assets(ctx: &mut StageContext) -> Result<()> {
    let release = ctx.release_path()?.to_string();
    if !ctx
        .executor
        .exists(&format!("{release}/package.json"), PathKind::File)?
    {
        log::debug!("no package.json, skipping assets");
        return Ok(());
    }

    // Reproducible install when the lockfile is committed.
    let install = if ctx
        .executor
        .exists(&format!("{release}/package-lock.json"), PathKind::File)?
    {
        "ci"
    } else {
        "install"
    };
    ctx.run_ok(&RemoteCommand::new("npm").arg(install).cwd(&release))?;
    ctx.run_ok(&RemoteCommand::new("npm").args(["run", "build"]).cwd(&release))?;
    Ok(())
}

fn final_actions(ctx: &mut StageContext) -> Result<()> {
    ctx.run_hook("final")
}

fn symlink(ctx: &mut StageContext) -> Result<()> {
    // Traffic cutover: everything before this left `current` untouched.
    ctx.run_ok(
        &RemoteCommand::new("ln")
            .arg("-sfn")
            .arg(ctx.release_path()?)
            .arg(ctx.resolved.current_path()),
    )?;
    Ok(())
}

fn unlock(ctx: &mut StageContext) -> Result<()> {
    remove_lock(ctx)
}

fn cleanup(ctx: &mut StageContext) -> Result<()> {
    let releases_root = ctx.resolved.releases_root();
    let mut ids: Vec<u64> = ctx
        .executor
        .list_children(&releases_root)?
        .into_iter()
        .filter(|e| e.kind == PathKind::Dir)
        .filter_map(|e| e.name.parse().ok())
        .collect();
    if ctx.release_id > 0 && !ids.contains(&ctx.release_id) {
        ids.push(ctx.release_id);
    }
    ids.sort_unstable_by(|a, b| b.cmp(a));

    for stale in ids.iter().skip(ctx.settings.keep_releases) {
        ctx.run_ok(
            &RemoteCommand::new("rm")
                .arg("-rf")
                .arg(format!("{releases_root}/{stale}")),
        )?;
    }
    Ok(())
}

fn cache_reset(ctx: &mut StageContext) -> Result<()> {
    // Best effort: hosts without php or opcache still deploy fine.
    let out = ctx.executor.run(
        &RemoteCommand::new("php")
            .arg("-r")
            .arg("if (function_exists('opcache_reset')) { opcache_reset(); }"),
    )?;
    if !out.success {
        log::debug!("opcache reset unavailable: {}", out.stderr);
    }
    Ok(())
}

fn success_actions(ctx: &mut StageContext) -> Result<()> {
    ctx.run_hook("success")
}

fn success(ctx: &mut StageContext) -> Result<()> {
    ui::success(&format!(
        "Site {} deployed to {} (release {})",
        ctx.site().name,
        ctx.host.label,
        ctx.release_id
    ));
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn lock_path(resolved: &ResolvedSite) -> String {
    format!("{}/.dep/deploy.lock", resolved.deploy_path)
}

fn remove_lock(ctx: &StageContext) -> Result<()> {
    ctx.run_ok(&RemoteCommand::new("rm").arg("-rf").arg(lock_path(ctx.resolved)))?;
    Ok(())
}

fn next_release_id(executor: &dyn RemoteExecutor, releases_root: &str) -> Result<u64> {
    let max = executor
        .list_children(releases_root)?
        .into_iter()
        .filter(|e| e.kind == PathKind::Dir)
        .filter_map(|e| e.name.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

fn parent_dir(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Some(parent),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SiteConfig, WritableMode};
    use crate::remote::RemoteEntry;
    use crate::remote::mock::MockExecutor;

    fn site(name: &str) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            source: "inline".to_string(),
            repository: "git@host:org/repo.git".to_string(),
            branch: "main".to_string(),
            deploy_path: None,
            shared_files: None,
            shared_dirs: None,
            writable_dirs: vec!["var".to_string(), "tmp".to_string()],
            writable_mode: WritableMode::Chmod,
            writable_use_sudo: false,
            writable_recursive: true,
            writable_chmod_mode: "0777".to_string(),
        }
    }

    fn host() -> HostTarget {
        HostTarget {
            label: "localhost".to_string(),
            hostname: None,
            user: "admin".to_string(),
            port: 2222,
            stage: "local".to_string(),
            ssh_args: Vec::new(),
        }
    }

    fn deploy(executor: &MockExecutor, site: &SiteConfig) -> crate::error::Result<()> {
        deploy_one(
            executor,
            &host(),
            &Settings::default(),
            site,
            &DeployOptions::default(),
        )
    }

    #[test]
    fn happy_path_reaches_symlink_and_unlock() {
        let executor = MockExecutor::new();
        deploy(&executor, &site("www.example.com")).unwrap();

        let deploy_path = "/var/www/sites/www.example.com";
        assert!(executor.ran("git ls-remote --heads git@host:org/repo.git main"));
        assert!(executor.ran(&format!(
            "git clone --branch main --single-branch --depth 1 git@host:org/repo.git {deploy_path}/releases/1"
        )));
        assert!(executor.ran(&format!(
            "ln -sfn {deploy_path}/releases/1 {deploy_path}/current"
        )));
        assert!(executor.ran(&format!("rm -rf {deploy_path}/.dep/deploy.lock")));

        // Cutover strictly after code update and the lock strictly before.
        let lock = executor.position("mkdir /var/www/sites/www.example.com/.dep/deploy.lock");
        let clone = executor.position("git clone");
        let cutover = executor.position(&format!("ln -sfn {deploy_path}/releases/1 {deploy_path}/current"));
        assert!(lock < clone && clone < cutover);
    }

    #[test]
    fn vendors_failure_never_reaches_symlink() {
        let executor = MockExecutor::new()
            .with_file("/var/www/sites/www.example.com/releases/1/composer.json")
            .failing_on("composer install");
        let err = deploy(&executor, &site("www.example.com")).unwrap_err();

        match err {
            Error::Stage { stage, site, .. } => {
                assert_eq!(stage, "vendors");
                assert_eq!(site, "www.example.com");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!executor.ran("current"));
    }

    #[test]
    fn vendors_skipped_without_composer_json() {
        let executor = MockExecutor::new();
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(!executor.ran("composer"));
    }

    #[test]
    fn assets_skipped_without_package_json() {
        let executor = MockExecutor::new();
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(!executor.ran("npm"));
    }

    #[test]
    fn assets_use_npm_ci_with_lockfile() {
        let release = "/var/www/sites/www.example.com/releases/1";
        let executor = MockExecutor::new()
            .with_file(&format!("{release}/package.json"))
            .with_file(&format!("{release}/package-lock.json"));
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(executor.ran("npm ci"));
        assert!(executor.ran("npm run build"));
    }

    #[test]
    fn assets_fall_back_to_npm_install_without_lockfile() {
        let release = "/var/www/sites/www.example.com/releases/1";
        let executor = MockExecutor::new().with_file(&format!("{release}/package.json"));
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(executor.ran("npm install"));
    }

    #[test]
    fn lock_failure_names_the_stage_and_hints_unlock() {
        let executor = MockExecutor::new().failing_on("mkdir /var/www/sites/www.example.com/.dep/deploy.lock");
        let err = deploy(&executor, &site("www.example.com")).unwrap_err();
        match err {
            Error::Stage { stage, cause, .. } => {
                assert_eq!(stage, "lock");
                assert!(cause.to_string().contains("--unlock"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unlock_first_removes_the_lock_before_locking() {
        let executor = MockExecutor::new();
        deploy_one(
            &executor,
            &host(),
            &Settings::default(),
            &site("www.example.com"),
            &DeployOptions { unlock_first: true },
        )
        .unwrap();

        let first_unlock = executor.position("rm -rf /var/www/sites/www.example.com/.dep/deploy.lock");
        let lock = executor.position("mkdir /var/www/sites/www.example.com/.dep/deploy.lock");
        assert!(first_unlock < lock);
    }

    #[test]
    fn release_numbering_continues_from_existing_releases() {
        let releases = "/var/www/sites/www.example.com/releases";
        let executor = MockExecutor::new().with_children(
            releases,
            vec![
                RemoteEntry { name: "1".to_string(), kind: PathKind::Dir },
                RemoteEntry { name: "2".to_string(), kind: PathKind::Dir },
                RemoteEntry { name: "5".to_string(), kind: PathKind::Dir },
            ],
        );
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(executor.ran(&format!("mkdir -p {releases}/6")));
    }

    #[test]
    fn cleanup_deletes_releases_beyond_keep_limit() {
        let releases = "/var/www/sites/www.example.com/releases";
        let executor = MockExecutor::new().with_children(
            releases,
            vec![
                RemoteEntry { name: "1".to_string(), kind: PathKind::Dir },
                RemoteEntry { name: "2".to_string(), kind: PathKind::Dir },
                RemoteEntry { name: "5".to_string(), kind: PathKind::Dir },
            ],
        );
        let settings = Settings {
            keep_releases: 2,
            ..Settings::default()
        };
        deploy_one(
            &executor,
            &host(),
            &settings,
            &site("www.example.com"),
            &DeployOptions::default(),
        )
        .unwrap();

        // New release is 6; keep 6 and 5, drop 2 and 1.
        assert!(executor.ran(&format!("rm -rf {releases}/2")));
        assert!(executor.ran(&format!("rm -rf {releases}/1")));
        assert!(!executor.ran(&format!("rm -rf {releases}/5")));
    }

    #[test]
    fn shared_file_is_seeded_and_linked() {
        let mut s = site("www.example.com");
        s.shared_files = Some(vec!["config.env".to_string()]);
        let executor = MockExecutor::new();
        deploy(&executor, &s).unwrap();

        let shared = "/var/www/sites/www.example.com/shared/config.env";
        let in_release = "/var/www/sites/www.example.com/releases/1/config.env";
        assert!(executor.ran(&format!("touch {shared}")));
        assert!(executor.ran(&format!("ln -sfn {shared} {in_release}")));
    }

    #[test]
    fn shared_dir_existing_in_shared_area_is_not_reseeded() {
        let mut s = site("www.example.com");
        s.shared_dirs = Some(vec!["uploads".to_string()]);
        let shared = "/var/www/sites/www.example.com/shared/uploads";
        let executor = MockExecutor::new().with_dir(shared);
        deploy(&executor, &s).unwrap();

        assert!(!executor.ran("cp -a"));
        assert!(executor.ran(&format!(
            "ln -sfn {shared} /var/www/sites/www.example.com/releases/1/uploads"
        )));
    }

    #[test]
    fn env_links_shared_dotenv_when_present() {
        let shared_env = "/var/www/sites/www.example.com/shared/.env";
        let executor = MockExecutor::new().with_file(shared_env);
        // default_shared lists are empty, so .env is not a resolved shared
        // file and the env stage links it directly.
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(executor.ran(&format!(
            "ln -sfn {shared_env} /var/www/sites/www.example.com/releases/1/.env"
        )));
    }

    #[test]
    fn hook_scripts_run_only_when_present() {
        let release = "/var/www/sites/www.example.com/releases/1";
        let executor = MockExecutor::new().with_file(&format!("{release}/.deploy/final.sh"));
        deploy(&executor, &site("www.example.com")).unwrap();
        assert!(executor.ran(&format!("sh {release}/.deploy/final.sh")));
        assert!(!executor.ran("initial.sh"));
        assert!(!executor.ran("success.sh"));
    }

    #[test]
    fn cache_reset_failure_is_not_fatal() {
        let executor = MockExecutor::new().failing_on("php -r");
        deploy(&executor, &site("www.example.com")).unwrap();
    }

    #[test]
    fn invalid_site_fails_before_any_remote_command() {
        let mut s = site("www.example.com");
        s.repository = String::new();
        let executor = MockExecutor::new();
        let err = deploy(&executor, &s).unwrap_err();
        assert!(matches!(err, Error::InvalidSite { .. }));
        assert!(executor.log.borrow().is_empty());
    }

    #[test]
    fn batch_stops_at_first_failing_site_by_default() {
        let a = site("a.example.com");
        let b = site("b.example.com");
        let c = site("c.example.com");
        // Fail site b's clone only.
        let executor = MockExecutor::new().failing_on("b.example.com/releases");

        let outcome = run_batch(
            &executor,
            &host(),
            &Settings::default(),
            &[&a, &b, &c],
            &DeployOptions::default(),
            false,
        );

        assert_eq!(outcome.deployed, ["a.example.com"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "b.example.com");
        assert_eq!(outcome.skipped, ["c.example.com"]);
        assert!(!executor.ran("c.example.com"));
    }

    #[test]
    fn batch_keep_going_deploys_remaining_sites() {
        let a = site("a.example.com");
        let b = site("b.example.com");
        let c = site("c.example.com");
        let executor = MockExecutor::new().failing_on("b.example.com/releases");

        let outcome = run_batch(
            &executor,
            &host(),
            &Settings::default(),
            &[&a, &b, &c],
            &DeployOptions::default(),
            true,
        );

        assert_eq!(outcome.deployed, ["a.example.com", "c.example.com"]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.skipped.is_empty());
        assert!(!outcome.is_success());
    }

    #[test]
    fn stage_table_matches_canonical_order() {
        let names: Vec<&str> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "info", "setup", "check_remote", "lock", "release", "update_code",
                "initial_actions", "env", "shared", "writable", "vendors", "assets",
                "final_actions", "symlink", "unlock", "cleanup", "cache_reset",
                "success_actions", "success",
            ]
        );
    }
}
