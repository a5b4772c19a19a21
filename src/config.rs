use serde_json::Value;
use thiserror::Error;
use tracing::{event, Level};

/// Charm configuration as handed over by the host, in declaration order.
pub type ConfigMap = serde_json::Map<String, Value>;

pub const FROM_PATH: &str = "from_path";
pub const TO_PATH: &str = "to_path";
pub const FROM_PATH_IS_REGEX: &str = "from_path_is_regex";
pub const DIRECT_PATH_REDIRECTS: &str = "direct_path_redirects";
pub const REGEX_PATH_REDIRECTS: &str = "regex_path_redirects";

/// A problem with a single redirect entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("from_path must not be empty")]
    EmptyFromPath,
    #[error("from_path must start with '/'")]
    RelativeFromPath,
    #[error("from_path is not a valid regex: {0}")]
    InvalidRegex(String),
    #[error("to_path must not be empty")]
    EmptyToPath,
    #[error("to_path must start with '/' or be an absolute http(s) URL")]
    InvalidToPath,
}

/// A configuration problem. The message is surfaced verbatim as the
/// blocked status, so every variant names the offending option.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is not a valid mapping: {source}")]
    Malformed {
        field: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{field} must be a map")]
    NotAMap { field: &'static str },
    #[error("{field} has duplicate entry `{key}`")]
    DuplicateEntry { field: &'static str, key: String },
    #[error("{field} entry `{key}`: {source}")]
    InvalidEntry {
        field: &'static str,
        key: String,
        #[source]
        source: RuleError,
    },
    #[error(transparent)]
    InvalidRule(#[from] RuleError),
    #[error("at least one redirect must be configured")]
    NoRedirects,
}

/// Returns true for destinations that replace the whole URL rather than
/// just the path.
pub fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub from_path: String,
    pub to_path: String,
    pub from_path_is_regex: bool,
}

impl RedirectRule {
    pub fn new(
        from_path: impl Into<String>,
        to_path: impl Into<String>,
        from_path_is_regex: bool,
    ) -> Self {
        Self {
            from_path: from_path.into(),
            to_path: to_path.into(),
            from_path_is_regex,
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.from_path.is_empty() {
            return Err(RuleError::EmptyFromPath);
        }
        if self.from_path_is_regex {
            if let Err(err) = regex::Regex::new(&self.from_path) {
                return Err(RuleError::InvalidRegex(err.to_string()));
            }
        } else if !self.from_path.starts_with('/') {
            return Err(RuleError::RelativeFromPath);
        }
        if self.to_path.is_empty() {
            return Err(RuleError::EmptyToPath);
        }
        if !self.to_path.starts_with('/') && !is_absolute_url(&self.to_path) {
            return Err(RuleError::InvalidToPath);
        }
        Ok(())
    }
}

/// The validated redirects for one reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectSet {
    /// The legacy `from_path`/`to_path`/`from_path_is_regex` options.
    Single(RedirectRule),
    /// The map-valued options, each in the order it was configured.
    Multiple {
        direct: Vec<RedirectRule>,
        regex: Vec<RedirectRule>,
    },
}

impl RedirectSet {
    /// Parses and validates the redirect options out of `config`. The
    /// first invalid entry wins; direct entries are checked before regex
    /// entries.
    pub fn from_config(config: &ConfigMap) -> Result<Self, ConfigError> {
        let direct = parse_rules(config, DIRECT_PATH_REDIRECTS, false)?;
        let regex = parse_rules(config, REGEX_PATH_REDIRECTS, true)?;

        let legacy_configured = [FROM_PATH, TO_PATH]
            .iter()
            .any(|key| !scalar(config.get(*key)).is_empty());

        if !direct.is_empty() || !regex.is_empty() {
            if legacy_configured {
                event!(
                    Level::WARN,
                    "{} and {} are ignored while {} or {} is set.",
                    FROM_PATH,
                    TO_PATH,
                    DIRECT_PATH_REDIRECTS,
                    REGEX_PATH_REDIRECTS
                );
            }
            return Ok(RedirectSet::Multiple { direct, regex });
        }

        if legacy_configured {
            let rule = RedirectRule::new(
                scalar(config.get(FROM_PATH)),
                scalar(config.get(TO_PATH)),
                flag(config.get(FROM_PATH_IS_REGEX)),
            );
            rule.validate()?;
            return Ok(RedirectSet::Single(rule));
        }

        Err(ConfigError::NoRedirects)
    }

    /// All rules, direct before regex.
    pub fn rules(&self) -> Box<dyn Iterator<Item = &RedirectRule> + '_> {
        match self {
            RedirectSet::Single(rule) => Box::new(std::iter::once(rule)),
            RedirectSet::Multiple { direct, regex } => Box::new(direct.iter().chain(regex.iter())),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RedirectSet::Single(_) => 1,
            RedirectSet::Multiple { direct, regex } => direct.len() + regex.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_rules(
    config: &ConfigMap,
    field: &'static str,
    from_path_is_regex: bool,
) -> Result<Vec<RedirectRule>, ConfigError> {
    let entries = match config.get(field) {
        Some(value) => parse_mapping(field, value)?,
        None => Vec::new(),
    };
    entries
        .into_iter()
        .map(|(from_path, to_path)| {
            let rule = RedirectRule::new(from_path, to_path, from_path_is_regex);
            match rule.validate() {
                Ok(()) => Ok(rule),
                Err(source) => Err(ConfigError::InvalidEntry {
                    field,
                    key: rule.from_path,
                    source,
                }),
            }
        })
        .collect()
}

/// Reads a map-valued option. Native objects are taken as they are;
/// strings are decoded as a YAML (or JSON) mapping. Keys and values come
/// back trimmed, in document order.
pub fn parse_mapping(field: &'static str, value: &Value) -> Result<Vec<(String, String)>, ConfigError> {
    let entries: Vec<(String, String)> = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.trim().to_owned(), scalar(Some(value))))
            .collect(),
        Value::String(raw) if raw.trim().is_empty() => return Ok(Vec::new()),
        Value::String(raw) => {
            let decoded: serde_yaml::Value = serde_yaml::from_str(raw)
                .map_err(|source| ConfigError::Malformed { field, source })?;
            match decoded {
                serde_yaml::Value::Mapping(mapping) => mapping
                    .iter()
                    .map(|(key, value)| (yaml_scalar(key), yaml_scalar(value)))
                    .collect(),
                _ => return Err(ConfigError::NotAMap { field }),
            }
        }
        _ => return Err(ConfigError::NotAMap { field }),
    };

    let mut seen = std::collections::BTreeSet::new();
    for (key, _) in &entries {
        if !seen.insert(key.as_str()) {
            return Err(ConfigError::DuplicateEntry {
                field,
                key: key.clone(),
            });
        }
    }
    Ok(entries)
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(other) => other.to_string().trim().to_owned(),
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.trim().to_owned(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default(),
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
