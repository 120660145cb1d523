//! Argument handling and dispatch to command implementations.

use anyhow::{Context, Result};
use clap::ArgMatches;
use editlock_core::{Owner, OwnerId, ResourceId};

use crate::{commands, AppContext};

/// Format an error for display, including the underlying cause when it adds
/// information.
pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    match err.root_cause().to_string() {
        cause if !cause.is_empty() && !msg.contains(&cause) => format!("{msg}\nCause: {cause}"),
        _ => msg,
    }
}

/// Process exit code for an error: the core's code when there is one.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<editlock_core::Error>()
        .map_or(1, editlock_core::Error::exit_code)
}

fn resource_id(sub_m: &ArgMatches) -> Result<ResourceId> {
    sub_m
        .get_one::<i64>("resource")
        .copied()
        .map(ResourceId::new)
        .context("Resource id is required")
}

fn required<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub_m
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("--{name} is required"))
}

/// A parsed subcommand, resolved before any store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Init,
    Acquire(ResourceId, Owner),
    Release(ResourceId, OwnerId),
    Inspect(ResourceId),
    List,
    Sweep,
    Serve { once: bool },
}

impl Action {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        match matches.subcommand() {
            Some(("init", _)) => Ok(Self::Init),
            Some(("acquire", sub_m)) => Ok(Self::Acquire(
                resource_id(sub_m)?,
                Owner::new(required(sub_m, "owner-id")?, required(sub_m, "owner-name")?),
            )),
            Some(("release", sub_m)) => Ok(Self::Release(
                resource_id(sub_m)?,
                OwnerId::new(required(sub_m, "owner-id")?),
            )),
            Some(("inspect", sub_m)) => Ok(Self::Inspect(resource_id(sub_m)?)),
            Some(("list", _)) => Ok(Self::List),
            Some(("sweep", _)) => Ok(Self::Sweep),
            Some(("serve", sub_m)) => Ok(Self::Serve {
                once: sub_m.get_flag("once"),
            }),
            _ => Err(anyhow::anyhow!("Unknown command. Run 'editlock --help' for usage.")),
        }
    }
}

pub async fn dispatch(matches: &ArgMatches) -> Result<i32> {
    let action = Action::from_matches(matches)?;
    let config = AppContext::resolve_config(matches)?;
    let ctx = AppContext::open(config).await?;

    let result = match &action {
        Action::Init => commands::init::run(&ctx),
        Action::Acquire(resource_id, owner) => {
            commands::lock::acquire(&ctx, *resource_id, owner).await
        }
        Action::Release(resource_id, owner_id) => {
            commands::lock::release(&ctx, *resource_id, owner_id).await
        }
        Action::Inspect(resource_id) => commands::lock::inspect(&ctx, *resource_id).await,
        Action::List => commands::lock::list(&ctx).await,
        Action::Sweep => commands::sweep::sweep(&ctx).await,
        Action::Serve { once } => commands::sweep::serve(&ctx, *once).await,
    };

    ctx.close().await;
    result
}
