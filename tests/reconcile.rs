use std::collections::BTreeMap;
use std::convert::Infallible;

use serde_json::{json, Value};

use traefik_path_redirector::{
    ConfigMap, Event, Model, ProxyConfigDocument, Reconciler, Relation, RelationId, Status,
    CONFIG_KEY, RAW_KEY, RELATION_NAME,
};

const APP: &str = "traefik-k8s-path-redirector";

/// An in-memory host: fixed config, at most one relation, and a record of
/// everything the charm wrote.
#[derive(Debug, Default)]
struct FakeModel {
    config: ConfigMap,
    relation: Option<Relation>,
    leader: bool,
    databag: BTreeMap<String, String>,
    writes: usize,
    status: Option<Status>,
}

impl FakeModel {
    fn new(config: Value) -> Self {
        let Value::Object(config) = config else {
            panic!("config must be an object");
        };
        Self {
            config,
            ..Default::default()
        }
    }

    fn leader(mut self) -> Self {
        self.leader = true;
        self
    }

    fn related(mut self, remote_app: Option<&str>) -> Self {
        self.relation = Some(Relation {
            id: RelationId(7),
            endpoint: RELATION_NAME.to_owned(),
            remote_app: remote_app.map(str::to_owned),
        });
        self
    }

    fn published(&self) -> ProxyConfigDocument {
        let raw = self.databag.get(CONFIG_KEY).expect("config was published");
        ProxyConfigDocument::from_json(raw).expect("published config decodes")
    }
}

impl Model for FakeModel {
    type Error = Infallible;

    fn app_name(&self) -> &str {
        APP
    }

    fn config(&self) -> Result<ConfigMap, Self::Error> {
        Ok(self.config.clone())
    }

    fn relation(&self, endpoint: &str) -> Result<Option<Relation>, Self::Error> {
        Ok(self
            .relation
            .clone()
            .filter(|relation| relation.endpoint == endpoint))
    }

    fn is_leader(&self) -> Result<bool, Self::Error> {
        Ok(self.leader)
    }

    fn set_app_data(
        &mut self,
        relation: RelationId,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), Self::Error> {
        assert_eq!(Some(relation), self.relation.as_ref().map(|r| r.id));
        self.writes += 1;
        match value {
            Some(value) => self.databag.insert(key.to_owned(), value.to_owned()),
            None => self.databag.remove(key),
        };
        Ok(())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), Self::Error> {
        self.status = Some(status.clone());
        Ok(())
    }
}

fn run(model: FakeModel, event: Event) -> (Status, FakeModel) {
    let mut reconciler = Reconciler::new(model);
    let status = reconciler.handle(event).expect("fake model never fails");
    let model = reconciler.into_model();
    assert_eq!(model.status.as_ref(), Some(&status));
    (status, model)
}

#[test]
fn test_waiting_without_relation() {
    let (status, model) = run(
        FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}})).leader(),
        Event::ConfigChanged,
    );
    assert_eq!(
        status,
        Status::Waiting("waiting for traefik-route relation".to_owned())
    );
    assert_eq!(model.writes, 0);
}

#[test]
fn test_invalid_config_blocks() {
    let (status, model) = run(
        FakeModel::new(json!({"from_path": "from", "to_path": "/to", "from_path_is_regex": false}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::ConfigChanged,
    );
    let Status::Blocked(reason) = status else {
        panic!("expected blocked, got {status:?}");
    };
    assert!(reason.contains("from_path"));
    assert_eq!(model.writes, 0);
}

#[test]
fn test_invalid_config_blocks_before_relation_check() {
    let (status, _) = run(
        FakeModel::new(json!({"direct_path_redirects": "not: [valid"})),
        Event::ConfigChanged,
    );
    assert_eq!(status.name(), "blocked");
    assert!(status.message().starts_with("direct_path_redirects"));
}

#[test]
fn test_nothing_configured_blocks() {
    let (status, _) = run(
        FakeModel::new(json!({})).leader().related(Some("traefik-k8s")),
        Event::ConfigChanged,
    );
    assert_eq!(
        status,
        Status::Blocked("at least one redirect must be configured".to_owned())
    );
}

#[test]
fn test_non_leader_waits() {
    let (status, model) = run(
        FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
            .related(Some("traefik-k8s")),
        Event::RelationJoined,
    );
    assert_eq!(status, Status::Waiting("waiting for leader".to_owned()));
    assert_eq!(model.writes, 0);
}

#[test]
fn test_waits_for_remote_app() {
    let (status, model) = run(
        FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
            .leader()
            .related(None),
        Event::RelationCreated,
    );
    assert_eq!(
        status,
        Status::Waiting("waiting for traefik-route remote application".to_owned())
    );
    assert_eq!(model.writes, 0);
}

#[test]
fn test_direct_redirect_published() {
    let (status, model) = run(
        FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::RelationJoined,
    );
    assert_eq!(status, Status::Active);
    assert_eq!(model.databag.get(RAW_KEY).map(String::as_str), Some("true"));

    let doc = model.published();
    let router_name = format!("{APP}-path-redirect-0");
    let middleware_name = format!("{APP}-path-redirect-0-middleware");
    let router = &doc.http.routers[&router_name];
    assert_eq!(router.rule, "PathPrefix(`/from`)");
    assert_eq!(router.middlewares, vec![middleware_name.clone()]);
    assert_eq!(
        doc.http.middlewares[&middleware_name]
            .redirect_regex
            .replacement,
        "${1}/to"
    );
}

#[test]
fn test_regex_redirect_published() {
    let (status, model) = run(
        FakeModel::new(json!({"regex_path_redirects": {"^/old(/.*)?$": "/new"}}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::RelationChanged,
    );
    assert_eq!(status, Status::Active);
    let doc = model.published();
    let middleware = &doc.http.middlewares[&format!("{APP}-path-redirect-0-middleware")];
    assert_eq!(
        middleware.redirect_regex.regex,
        "^(https?://[^/]+)/old(/.*)?(.*)$"
    );
    assert_eq!(
        doc.http.routers[&format!("{APP}-path-redirect-0-tls")].rule,
        "PathRegexp(`^/old(/.*)?$`)"
    );
}

#[test]
fn test_absolute_url_destination() {
    let (_, model) = run(
        FakeModel::new(json!({"direct_path_redirects": "/from: https://ubuntu.net/hello"}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::ConfigChanged,
    );
    let doc = model.published();
    assert_eq!(
        doc.http.middlewares[&format!("{APP}-path-redirect-0-middleware")]
            .redirect_regex
            .replacement,
        "https://ubuntu.net/hello"
    );
}

#[test]
fn test_legacy_single_redirect() {
    let (status, model) = run(
        FakeModel::new(json!({"from_path": "/from", "to_path": "/to", "from_path_is_regex": false}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::LeaderElected,
    );
    assert_eq!(status, Status::Active);
    let doc = model.published();
    let names: Vec<_> = doc.http.routers.keys().cloned().collect();
    assert_eq!(
        names,
        vec![
            format!("{APP}-path-redirect"),
            format!("{APP}-path-redirect-tls"),
        ]
    );
}

#[test]
fn test_multiple_redirects_are_indexed() {
    let (_, model) = run(
        FakeModel::new(json!({
            "regex_path_redirects": {"^/r$": "/x"},
            "direct_path_redirects": {"/b": "/y", "/a": "/z"},
        }))
        .leader()
        .related(Some("traefik-k8s")),
        Event::UpgradeCharm,
    );
    let doc = model.published();
    assert_eq!(doc.http.routers.len(), 6);
    assert_eq!(doc.http.middlewares.len(), 3);
    assert_eq!(
        doc.http.routers[&format!("{APP}-path-redirect-0")].rule,
        "PathPrefix(`/b`)"
    );
    assert_eq!(
        doc.http.routers[&format!("{APP}-path-redirect-1")].rule,
        "PathPrefix(`/a`)"
    );
    assert_eq!(
        doc.http.routers[&format!("{APP}-path-redirect-2")].rule,
        "PathRegexp(`^/r$`)"
    );
    for index in 0..3 {
        let middleware = format!("{APP}-path-redirect-{index}-middleware");
        let plain = &doc.http.routers[&format!("{APP}-path-redirect-{index}")];
        let tls = &doc.http.routers[&format!("{APP}-path-redirect-{index}-tls")];
        assert_eq!(plain.middlewares, vec![middleware.clone()]);
        assert_eq!(tls.middlewares, vec![middleware]);
        assert!(plain.tls.is_none());
        assert!(tls.tls.is_some());
    }
}

#[test]
fn test_reconcile_is_idempotent() {
    let model = FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
        .leader()
        .related(Some("traefik-k8s"));
    let mut reconciler = Reconciler::new(model);
    reconciler
        .handle(Event::ConfigChanged)
        .expect("fake model never fails");
    let first = reconciler.model().databag[CONFIG_KEY].clone();
    let bound = reconciler.requirer().cloned();

    reconciler
        .handle(Event::RouteReady)
        .expect("fake model never fails");
    assert_eq!(reconciler.model().databag[CONFIG_KEY], first);
    assert_eq!(reconciler.requirer().cloned(), bound);
}

#[test]
fn test_published_document_shape() {
    let (_, model) = run(
        FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
            .leader()
            .related(Some("traefik-k8s")),
        Event::ConfigChanged,
    );
    let value: Value =
        serde_json::from_str(&model.databag[CONFIG_KEY]).expect("published config is json");
    let http = value["http"].as_object().expect("http is a map");
    let keys: Vec<_> = http.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["routers", "middlewares"]);
    assert_eq!(
        value["http"]["middlewares"][format!("{APP}-path-redirect-0-middleware")],
        json!({
            "redirectRegex": {
                "regex": "^(https?://[^/]+)/from$",
                "replacement": "${1}/to",
                "permanent": true,
            }
        })
    );
    assert_eq!(
        value["http"]["routers"][format!("{APP}-path-redirect-0-tls")],
        json!({
            "rule": "PathPrefix(`/from`)",
            "service": "noop@internal",
            "middlewares": [format!("{APP}-path-redirect-0-middleware")],
            "tls": {},
        })
    );
}

#[test]
fn test_broken_relation_waits_and_unbinds() {
    let model = FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
        .leader()
        .related(Some("traefik-k8s"));
    let mut reconciler = Reconciler::new(model);
    reconciler
        .handle(Event::RelationJoined)
        .expect("fake model never fails");
    assert!(reconciler.requirer().is_some());
    let writes = reconciler.model().writes;

    let status = reconciler
        .handle(Event::RelationBroken(RelationId(7)))
        .expect("fake model never fails");
    assert_eq!(
        status,
        Status::Waiting("waiting for traefik-route relation".to_owned())
    );
    assert!(reconciler.requirer().is_none());
    assert_eq!(reconciler.model().writes, writes);
}

#[test]
fn test_raw_marker_can_be_disabled() {
    let model = FakeModel::new(json!({"direct_path_redirects": {"/from": "/to"}}))
        .leader()
        .related(Some("traefik-k8s"));
    let mut reconciler = Reconciler::new(model).with_raw(false);
    reconciler
        .handle(Event::ConfigChanged)
        .expect("fake model never fails");
    assert!(reconciler.model().databag.contains_key(CONFIG_KEY));
    assert!(!reconciler.model().databag.contains_key(RAW_KEY));
}
