//! Traefik dynamic configuration for path redirects.
//!
//! Every [`RedirectRule`] becomes one `redirectRegex` middleware and two
//! routers pointing at it, one for the plain entrypoint and one for the
//! TLS entrypoint. The routers forward to `noop@internal`, so the
//! middleware's redirect is the only thing that ever answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{is_absolute_url, RedirectRule, RedirectSet};

/// Traefik's built-in service that drops requests on the floor.
pub const NOOP_SERVICE: &str = "noop@internal";

/// Matches the scheme and host of the request URL as capture group 1.
const HOST_PREFIX: &str = "^(https?://[^/]+)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfigDocument {
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub routers: BTreeMap<String, Router>,
    pub middlewares: BTreeMap<String, Middleware>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Router {
    pub rule: String,
    pub service: String,
    pub middlewares: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Present (as `{}`) on routers bound to the TLS entrypoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Middleware {
    #[serde(rename = "redirectRegex")]
    pub redirect_regex: RedirectRegex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectRegex {
    pub regex: String,
    pub replacement: String,
    pub permanent: bool,
}

impl ProxyConfigDocument {
    /// The wire form published on the relation. Field and key order are
    /// fixed, so equal documents always encode to equal bytes.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Builds the routers and middlewares for `redirects`, naming them after
/// `app_name`.
pub fn build(app_name: &str, redirects: &RedirectSet) -> ProxyConfigDocument {
    let mut http = HttpConfig::default();
    let indexed = matches!(redirects, RedirectSet::Multiple { .. });

    for (index, rule) in redirects.rules().enumerate() {
        let base = if indexed {
            format!("{app_name}-path-redirect-{index}")
        } else {
            format!("{app_name}-path-redirect")
        };
        let middleware_name = format!("{base}-middleware");
        let rule_expression = router_rule(rule);

        http.routers.insert(
            format!("{base}-tls"),
            Router {
                rule: rule_expression.clone(),
                service: NOOP_SERVICE.to_owned(),
                middlewares: vec![middleware_name.clone()],
                tls: Some(TlsConfig {}),
            },
        );
        http.routers.insert(
            base,
            Router {
                rule: rule_expression,
                service: NOOP_SERVICE.to_owned(),
                middlewares: vec![middleware_name.clone()],
                tls: None,
            },
        );
        http.middlewares.insert(
            middleware_name,
            Middleware {
                redirect_regex: redirect_regex(rule),
            },
        );
    }

    ProxyConfigDocument { http }
}

fn router_rule(rule: &RedirectRule) -> String {
    if rule.from_path_is_regex {
        format!("PathRegexp(`{}`)", rule.from_path)
    } else {
        format!("PathPrefix(`{}`)", rule.from_path)
    }
}

fn redirect_regex(rule: &RedirectRule) -> RedirectRegex {
    let absolute = is_absolute_url(&rule.to_path);
    let (regex, replacement) = if rule.from_path_is_regex {
        // Group 2 carries whatever follows the matched prefix.
        let regex = format!("{HOST_PREFIX}{}(.*)$", strip_anchors(&rule.from_path));
        let replacement = if absolute {
            format!("{}${{2}}", rule.to_path)
        } else {
            format!("${{1}}{}${{2}}", rule.to_path)
        };
        (regex, replacement)
    } else {
        let regex = format!("{HOST_PREFIX}{}$", regex::escape(&rule.from_path));
        let replacement = if absolute {
            rule.to_path.clone()
        } else {
            format!("${{1}}{}", rule.to_path)
        };
        (regex, replacement)
    };
    RedirectRegex {
        regex,
        replacement,
        permanent: true,
    }
}

/// Drops one leading `^` and one trailing unescaped `$` so the pattern
/// can sit between the host prefix and the remainder group.
fn strip_anchors(pattern: &str) -> &str {
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    match pattern.strip_suffix('$') {
        Some(stripped) => {
            let backslashes = stripped.chars().rev().take_while(|c| *c == '\\').count();
            if backslashes % 2 == 0 {
                stripped
            } else {
                pattern
            }
        }
        None => pattern,
    }
}
