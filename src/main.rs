use anyhow::{Context, Result};
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use traefik_path_redirector::{Event, HookTools, Reconciler, RelationId};

fn main() -> Result<()> {
    // Juju collects hook stderr into the unit log.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let dispatch_path =
        std::env::var("JUJU_DISPATCH_PATH").context("JUJU_DISPATCH_PATH is not set")?;
    let hook = dispatch_path
        .rsplit('/')
        .next()
        .unwrap_or(dispatch_path.as_str());
    let relation_id = match std::env::var("JUJU_RELATION_ID") {
        Ok(id) if !id.is_empty() => Some(
            id.parse::<RelationId>()
                .with_context(|| format!("JUJU_RELATION_ID `{id}` is not a relation id"))?,
        ),
        _ => None,
    };

    let Some(event) = Event::from_hook(hook, relation_id) else {
        event!(Level::DEBUG, hook, "Hook is not observed, nothing to do.");
        return Ok(());
    };

    let model = HookTools::from_env().context("not running inside a Juju hook")?;
    let status = Reconciler::new(model)
        .handle(event)
        .with_context(|| format!("{hook} failed"))?;
    event!(Level::INFO, hook, status = %status, "Hook complete.");
    Ok(())
}
