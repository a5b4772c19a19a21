//! A [`Model`] backed by the Juju hook tools available to a running hook.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{event, Level};

use crate::config::ConfigMap;
use crate::controller::{Model, Status};
use crate::relation::{InvalidRelationId, Relation, RelationId};

#[derive(Debug, Error)]
pub enum HookToolError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unexpected output from {tool}: {source}")]
    Output {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    RelationId(#[from] InvalidRelationId),
}

/// Talks to the Juju agent through `config-get`, `relation-set` and
/// friends, which are on `PATH` for the duration of a hook.
#[derive(Debug, Clone)]
pub struct HookTools {
    app_name: String,
}

impl HookTools {
    /// Reads the application name out of `JUJU_UNIT_NAME` (`<app>/<n>`).
    pub fn from_env() -> Result<Self, HookToolError> {
        let unit = std::env::var("JUJU_UNIT_NAME")
            .map_err(|_| HookToolError::MissingEnv("JUJU_UNIT_NAME"))?;
        let app_name = unit.split('/').next().unwrap_or(&unit).to_owned();
        Ok(Self { app_name })
    }

    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn run(
        &self,
        tool: &'static str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, HookToolError> {
        event!(Level::DEBUG, tool, ?args, "Running hook tool.");
        let mut child = Command::new(tool)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HookToolError::Spawn { tool, source })?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .map_err(|source| HookToolError::Spawn { tool, source })?;
        }
        let output = child
            .wait_with_output()
            .map_err(|source| HookToolError::Spawn { tool, source })?;
        if !output.status.success() {
            return Err(HookToolError::Failed {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_json<T: DeserializeOwned>(
        &self,
        tool: &'static str,
        args: &[&str],
    ) -> Result<T, HookToolError> {
        let stdout = self.run(tool, args, None)?;
        serde_json::from_str(&stdout).map_err(|source| HookToolError::Output { tool, source })
    }
}

impl Model for HookTools {
    type Error = HookToolError;

    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn config(&self) -> Result<ConfigMap, Self::Error> {
        let config: Option<ConfigMap> = self.run_json("config-get", &["--format=json"])?;
        Ok(config.unwrap_or_default())
    }

    fn relation(&self, endpoint: &str) -> Result<Option<Relation>, Self::Error> {
        let ids: Option<Vec<String>> =
            self.run_json("relation-ids", &[endpoint, "--format=json"])?;
        let Some(raw_id) = ids.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };
        let id: RelationId = raw_id.parse()?;
        let remote_app: Option<String> =
            self.run_json("relation-list", &["-r", &raw_id, "--app", "--format=json"])?;
        Ok(Some(Relation {
            id,
            endpoint: endpoint.to_owned(),
            remote_app: remote_app.filter(|app| !app.is_empty()),
        }))
    }

    fn is_leader(&self) -> Result<bool, Self::Error> {
        self.run_json("is-leader", &["--format=json"])
    }

    fn set_app_data(
        &mut self,
        relation: RelationId,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), Self::Error> {
        // relation-set deletes keys that are set to the empty string.
        let mut settings = serde_json::Map::new();
        settings.insert(key.to_owned(), value.unwrap_or_default().into());
        let settings = serde_json::Value::Object(settings).to_string();
        let id = relation.to_string();
        self.run(
            "relation-set",
            &["-r", &id, "--app", "--file", "-"],
            Some(&settings),
        )?;
        Ok(())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), Self::Error> {
        self.run("status-set", &[status.name(), status.message()], None)?;
        Ok(())
    }
}
