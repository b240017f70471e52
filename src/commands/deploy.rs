//! `deploy` and `deploy-all` - run the release pipeline
//!
//! Resolution errors (unknown site, empty catalog, invalid declaration)
//! are reported and end the command without a process failure; pipeline
//! stage errors are fatal.

use anyhow::{Result, bail};
use dialoguer::Confirm;

use crate::Context;
use crate::catalog::Catalog;
use crate::cli::{DeployAllArgs, DeployArgs, HostArgs};
use crate::config::Config;
use crate::host::{self, HostTarget};
use crate::pipeline::{self, DeployOptions};
use crate::remote::SshExecutor;
use crate::{select, ui};

fn pick_host(config: &Config, args: &HostArgs) -> Result<HostTarget> {
    host::select_host(
        &config.settings.hosts,
        HostTarget::from_env(),
        args.host.as_deref(),
        args.stage.as_deref(),
    )
}

pub fn single(_ctx: &Context, config: &Config, args: &DeployArgs) -> Result<()> {
    let catalog = Catalog::load(&config.sources);
    let site = match select::find(&catalog, &args.site, args.source.as_deref()) {
        Ok(site) => site.clone(),
        Err(err) => {
            ui::error(&err.to_string());
            return Ok(());
        }
    };

    let target = pick_host(config, &args.host)?;
    let executor = SshExecutor::new(target.clone());
    let opts = DeployOptions {
        unlock_first: args.unlock,
    };

    match pipeline::deploy_one(&executor, &target, &config.settings, &site, &opts) {
        Ok(()) => {
            ui::success("Deploy completed successfully!");
            Ok(())
        }
        Err(err) if err.is_resolution() => {
            ui::error(&err.to_string());
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

pub fn all(ctx: &Context, config: &Config, args: &DeployAllArgs) -> Result<()> {
    let catalog = Catalog::load(&config.sources);
    let sites = match select::filter(&catalog, args.source.as_deref()) {
        Ok(sites) => sites,
        Err(err) => {
            ui::error(&err.to_string());
            return Ok(());
        }
    };

    let target = pick_host(config, &args.host)?;

    if !args.yes && !ctx.quiet {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Deploy {} site(s) to {}?",
                sites.len(),
                target.label
            ))
            .default(true)
            .interact()?;
        if !confirmed {
            ui::warn("Aborted");
            return Ok(());
        }
    }

    let executor = SshExecutor::new(target.clone());
    let opts = DeployOptions {
        unlock_first: args.unlock,
    };

    let outcome = pipeline::run_batch(
        &executor,
        &target,
        &config.settings,
        &sites,
        &opts,
        args.keep_going,
    );

    println!();
    if !outcome.deployed.is_empty() {
        ui::success(&format!("{} site(s) deployed", outcome.deployed.len()));
    }
    for name in &outcome.skipped {
        ui::warn(&format!("{name} skipped (earlier failure stopped the batch)"));
    }
    if !outcome.is_success() {
        bail!("deployment failed for {} site(s)", outcome.failed.len());
    }
    ui::success("Deploy completed successfully!");
    Ok(())
}
