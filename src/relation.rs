use std::fmt;
use std::str::FromStr;

use tracing::{event, Level};

use crate::controller::Model;
use crate::route::ProxyConfigDocument;

/// Databag key holding the serialized routing document.
pub const CONFIG_KEY: &str = "config";
/// Databag key telling traefik to use the document as-is, without templating.
pub const RAW_KEY: &str = "raw";

/// The numeric part of a Juju relation id such as `traefik-route:3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid relation id `{0}`")]
pub struct InvalidRelationId(String);

impl FromStr for RelationId {
    type Err = InvalidRelationId;

    /// Accepts both `<endpoint>:<id>` and a bare `<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.rsplit(':').next().unwrap_or(s);
        id.parse()
            .map(RelationId)
            .map_err(|_| InvalidRelationId(s.to_owned()))
    }
}

/// One established relation on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub id: RelationId,
    pub endpoint: String,
    /// The remote application, once Juju has told us who it is.
    pub remote_app: Option<String>,
}

/// Publishes routing documents on one `traefik-route` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirer {
    relation_id: RelationId,
    raw: bool,
}

impl RouteRequirer {
    /// Binds to `relation`, or returns `None` while the remote side is
    /// not known yet.
    pub fn bind(relation: &Relation, raw: bool) -> Option<Self> {
        relation.remote_app.as_ref()?;
        Some(Self {
            relation_id: relation.id,
            raw,
        })
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_id
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Replaces whatever was previously published on the relation.
    pub fn submit<M: Model>(
        &self,
        model: &mut M,
        document: &ProxyConfigDocument,
    ) -> Result<(), SubmitError<M::Error>> {
        let encoded = document.to_json()?;
        model
            .set_app_data(self.relation_id, CONFIG_KEY, Some(&encoded))
            .map_err(SubmitError::Model)?;
        let raw = if self.raw { Some("true") } else { None };
        model
            .set_app_data(self.relation_id, RAW_KEY, raw)
            .map_err(SubmitError::Model)?;
        event!(
            Level::DEBUG,
            relation_id = %self.relation_id,
            routers = document.http.routers.len(),
            middlewares = document.http.middlewares.len(),
            "Submitted route configuration."
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError<E: std::error::Error + 'static> {
    #[error("failed to encode route configuration: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write relation data: {0}")]
    Model(#[source] E),
}
