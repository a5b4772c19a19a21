use std::fmt;

use tracing::{event, Level};

use crate::config::{ConfigMap, RedirectSet};
use crate::relation::{Relation, RelationId, RouteRequirer, SubmitError};
use crate::route;

/// The endpoint the routing document is published on.
pub const RELATION_NAME: &str = "traefik-route";
/// The interface spoken on [`RELATION_NAME`].
pub const RELATION_INTERFACE: &str = "traefik_route";

/// The [`Model`] trait is the charm's view of the host: configuration,
/// relations, leadership and status. The [`Reconciler`] only ever talks to
/// the outside world through it.
pub trait Model {
    /// The error type returned when the host cannot answer or apply a
    /// request.
    type Error: std::error::Error + 'static;

    /// The name of the application this unit belongs to. Router and
    /// middleware names are derived from it.
    fn app_name(&self) -> &str;

    /// The current charm configuration.
    fn config(&self) -> Result<ConfigMap, Self::Error>;

    /// The relation established on `endpoint`, if any.
    fn relation(&self, endpoint: &str) -> Result<Option<Relation>, Self::Error>;

    fn is_leader(&self) -> Result<bool, Self::Error>;

    /// Writes `key` in this application's databag on `relation`. `None`
    /// removes the key.
    fn set_app_data(
        &mut self,
        relation: RelationId,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), Self::Error>;

    fn set_status(&mut self, status: &Status) -> Result<(), Self::Error>;
}

/// The unit status left behind by a reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Active,
    Blocked(String),
    Waiting(String),
}

impl Status {
    /// The status name as the host knows it.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Blocked(_) => "blocked",
            Status::Waiting(_) => "waiting",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Status::Active => "",
            Status::Blocked(message) | Status::Waiting(message) => message,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Active => f.write_str(self.name()),
            _ => write!(f, "{}: {}", self.name(), self.message()),
        }
    }
}

/// The events that trigger a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ConfigChanged,
    RelationCreated,
    RelationJoined,
    RelationChanged,
    /// The given relation is going away; it no longer counts as present.
    RelationBroken(RelationId),
    LeaderElected,
    UpgradeCharm,
    /// The route requirer reports the relation is ready for a document.
    RouteReady,
}

impl Event {
    /// Maps a Juju hook name to the event it raises. Hooks the charm does
    /// not observe map to `None`.
    pub fn from_hook(hook: &str, relation_id: Option<RelationId>) -> Option<Self> {
        match hook {
            "config-changed" => return Some(Event::ConfigChanged),
            "leader-elected" => return Some(Event::LeaderElected),
            "upgrade-charm" => return Some(Event::UpgradeCharm),
            _ => {}
        }
        let suffix = hook.strip_prefix(RELATION_NAME)?.strip_prefix("-relation-")?;
        match suffix {
            "created" => Some(Event::RelationCreated),
            "joined" => Some(Event::RelationJoined),
            "changed" => Some(Event::RelationChanged),
            "broken" => relation_id.map(Event::RelationBroken),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Event::ConfigChanged => "config-changed",
            Event::RelationCreated => "relation-created",
            Event::RelationJoined => "relation-joined",
            Event::RelationChanged => "relation-changed",
            Event::RelationBroken(_) => "relation-broken",
            Event::LeaderElected => "leader-elected",
            Event::UpgradeCharm => "upgrade-charm",
            Event::RouteReady => "route-ready",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("model operation failed: {0}")]
    Model(#[source] E),
    #[error("failed to encode route configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

impl<E: std::error::Error + 'static> From<SubmitError<E>> for Error<E> {
    fn from(err: SubmitError<E>) -> Self {
        match err {
            SubmitError::Encode(err) => Error::Encode(err),
            SubmitError::Model(err) => Error::Model(err),
        }
    }
}

/// The [`Reconciler`] recomputes and publishes the routing document
/// whenever an [`Event`] arrives, and keeps the unit status in line with
/// the outcome.
pub struct Reconciler<M: Model> {
    model: M,
    requirer: Option<RouteRequirer>,
    raw: bool,
}

impl<M: Model> Reconciler<M> {
    /// Creates a reconciler that publishes documents flagged as raw.
    pub fn new(model: M) -> Self {
        Self {
            model,
            requirer: None,
            raw: true,
        }
    }

    /// Sets whether published documents carry the `raw` marker.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// The route requirer bound so far, if any.
    pub fn requirer(&self) -> Option<&RouteRequirer> {
        self.requirer.as_ref()
    }

    /// Handles one event. Every event runs the full reconcile; only a
    /// broken relation changes how it runs.
    pub fn handle(&mut self, event: Event) -> Result<Status, Error<M::Error>> {
        event!(
            Level::INFO,
            app = %self.model.app_name(),
            hook = event.name(),
            "Reconciling path redirects."
        );
        let broken = match event {
            Event::RelationBroken(id) => Some(id),
            _ => None,
        };
        let status = self.reconcile(broken)?;
        self.model.set_status(&status).map_err(Error::Model)?;
        match &status {
            Status::Active => event!(
                Level::INFO,
                app = %self.model.app_name(),
                "Path redirect reconciliation successful."
            ),
            Status::Blocked(reason) => event!(
                Level::WARN,
                app = %self.model.app_name(),
                reason = %reason,
                "Path redirect configuration is invalid."
            ),
            Status::Waiting(reason) => event!(
                Level::INFO,
                app = %self.model.app_name(),
                reason = %reason,
                "Path redirect reconciliation is waiting."
            ),
        }
        Ok(status)
    }

    fn reconcile(&mut self, broken: Option<RelationId>) -> Result<Status, Error<M::Error>> {
        let config = self.model.config().map_err(Error::Model)?;
        let redirects = match RedirectSet::from_config(&config) {
            Ok(redirects) => redirects,
            Err(err) => return Ok(Status::Blocked(err.to_string())),
        };

        let relation = self
            .model
            .relation(RELATION_NAME)
            .map_err(Error::Model)?
            .filter(|relation| Some(relation.id) != broken);
        let Some(relation) = relation else {
            self.requirer = None;
            return Ok(Status::Waiting(format!("waiting for {RELATION_NAME} relation")));
        };

        if !self.model.is_leader().map_err(Error::Model)? {
            return Ok(Status::Waiting("waiting for leader".to_owned()));
        }

        let Some(requirer) = self.ensure_requirer(&relation) else {
            return Ok(Status::Waiting(format!(
                "waiting for {RELATION_NAME} remote application"
            )));
        };

        let document = route::build(self.model.app_name(), &redirects);
        requirer.submit(&mut self.model, &document)?;
        Ok(Status::Active)
    }

    /// Returns the requirer for `relation`, binding a new one only when
    /// none exists yet or the relation has been replaced.
    fn ensure_requirer(&mut self, relation: &Relation) -> Option<RouteRequirer> {
        let bound = self
            .requirer
            .as_ref()
            .is_some_and(|requirer| requirer.relation_id() == relation.id);
        if !bound {
            self.requirer = RouteRequirer::bind(relation, self.raw);
            if self.requirer.is_some() {
                event!(
                    Level::DEBUG,
                    relation_id = %relation.id,
                    remote_app = relation.remote_app.as_deref().unwrap_or_default(),
                    "Bound route requirer."
                );
            }
        }
        self.requirer.clone()
    }
}
