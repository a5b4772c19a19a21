#![allow(clippy::style)]
#![allow(clippy::complexity)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::map_entry)]
#![warn(clippy::bool_comparison)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::no_effect)]
#![warn(clippy::unnecessary_unwrap)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::todo)]
#![warn(clippy::wildcard_dependencies)]
#![warn(clippy::borrowed_box)]
#![warn(clippy::deref_addrof)]
#![warn(clippy::double_must_use)]
#![warn(clippy::double_parens)]
#![warn(clippy::extra_unused_lifetimes)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_question_mark)]
#![warn(clippy::needless_return)]
#![warn(clippy::redundant_pattern)]
#![warn(clippy::redundant_slicing)]
#![warn(clippy::redundant_static_lifetimes)]
#![warn(clippy::single_component_path_imports)]
#![warn(clippy::unnecessary_cast)]
#![warn(clippy::useless_asref)]
#![warn(clippy::useless_conversion)]
#![warn(clippy::builtin_type_shadow)]
#![warn(clippy::duplicate_underscore_argument)]
#![warn(double_negations)]
#![warn(clippy::unnecessary_mut_passed)]
#![warn(clippy::wildcard_in_or_patterns)]
#![warn(clippy::as_conversions)]
#![warn(clippy::match_overlapping_arm)]
#![warn(clippy::must_use_unit)]
#![warn(clippy::suspicious_assignment_formatting)]
#![warn(clippy::suspicious_else_formatting)]
#![warn(clippy::suspicious_unary_op_formatting)]
#![warn(clippy::print_literal)]
#![warn(clippy::same_item_push)]
#![warn(clippy::useless_format)]
#![warn(clippy::write_literal)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::redundant_closure_call)]
#![warn(clippy::unnecessary_lazy_evaluations)]
#![warn(clippy::partialeq_ne_impl)]
#![warn(clippy::redundant_field_names)]
#![warn(clippy::disallowed_methods)]
#![warn(clippy::disallowed_macros)]
#![warn(clippy::disallowed_types)]
#![warn(clippy::from_over_into)]
//! This crate implements a Juju charm that publishes path redirects to
//! Traefik over the `traefik-route` relation. Redirects are configured
//! either through the `direct_path_redirects` and `regex_path_redirects`
//! options or through the single `from_path`/`to_path` pair, and each one
//! becomes a `redirectRegex` middleware with a plain and a TLS router in
//! front of it.
//!
//! The host is abstracted behind the [`Model`] trait. A [`Reconciler`]
//! wraps a model and recomputes everything on each [`Event`]:
//!
//! ```no_run
//! # use std::collections::BTreeMap;
//! # use std::convert::Infallible;
//! use traefik_path_redirector::{
//!     ConfigMap, Event, Model, Reconciler, Relation, RelationId, Status,
//! };
//!
//! struct StaticModel {
//!     config: ConfigMap,
//!     databag: BTreeMap<String, String>,
//!     status: Option<Status>,
//! }
//!
//! impl Model for StaticModel {
//!     type Error = Infallible;
//!
//!     fn app_name(&self) -> &str {
//!         "redirector"
//!     }
//!
//!     fn config(&self) -> Result<ConfigMap, Self::Error> {
//!         Ok(self.config.clone())
//!     }
//!
//!     fn relation(&self, endpoint: &str) -> Result<Option<Relation>, Self::Error> {
//!         Ok(Some(Relation {
//!             id: RelationId(0),
//!             endpoint: endpoint.to_owned(),
//!             remote_app: Some("traefik-k8s".to_owned()),
//!         }))
//!     }
//!
//!     fn is_leader(&self) -> Result<bool, Self::Error> {
//!         Ok(true)
//!     }
//!
//!     fn set_app_data(
//!         &mut self,
//!         _relation: RelationId,
//!         key: &str,
//!         value: Option<&str>,
//!     ) -> Result<(), Self::Error> {
//!         match value {
//!             Some(value) => self.databag.insert(key.to_owned(), value.to_owned()),
//!             None => self.databag.remove(key),
//!         };
//!         Ok(())
//!     }
//!
//!     fn set_status(&mut self, status: &Status) -> Result<(), Self::Error> {
//!         self.status = Some(status.clone());
//!         Ok(())
//!     }
//! }
//!
//! let mut config = ConfigMap::new();
//! config.insert("direct_path_redirects".into(), "/old: /new".into());
//! let model = StaticModel {
//!     config,
//!     databag: BTreeMap::new(),
//!     status: None,
//! };
//! let mut reconciler = Reconciler::new(model);
//! let status = reconciler.handle(Event::ConfigChanged).unwrap();
//! assert_eq!(status, Status::Active);
//! println!("{}", reconciler.model().databag["config"]);
//! ```
//!
//! Inside a real hook, [`HookTools`] is the model and the `dispatch`
//! binary maps `JUJU_DISPATCH_PATH` to an [`Event`].

mod config;
mod controller;
mod hook_tools;
mod relation;
pub mod route;

pub use config::{
    is_absolute_url, parse_mapping, ConfigError, ConfigMap, RedirectRule, RedirectSet, RuleError,
};
pub use controller::{Error, Event, Model, Reconciler, Status, RELATION_INTERFACE, RELATION_NAME};
pub use hook_tools::{HookToolError, HookTools};
pub use relation::{
    InvalidRelationId, Relation, RelationId, RouteRequirer, SubmitError, CONFIG_KEY, RAW_KEY,
};
pub use route::{build, ProxyConfigDocument};
