//! Configuration variables and their resolution.
//!
//! A [`VariableSpec`] declares one named setting. Values come from an
//! ordered stack of [`Source`]s; the first source that defines a name wins,
//! then the declared default applies.
//!
//! ```text
//! precedence (highest first)
//!   1. Override     ── --set NAME=VALUE
//!   2. File         ── .env at the project root
//!   3. Environment  ── process environment snapshot
//!   4. Default      ── [[variables]].default
//! ```
//!
//! Only build-time values are validated. Run-time values are resolved for
//! reporting and baked in as `ENV` defaults, nothing more.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// When a value is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Bound into the image during the build.
    Build,
    /// Read by the application when the container starts.
    Run,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Scope::Build => "build",
            Scope::Run => "run",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Text,
    /// Absolute http(s) URL.
    Url,
}

/// Declaration of one configuration value (`[[variables]]` in dockwright.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub scope: Scope,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl VariableSpec {
    pub fn build(name: &str) -> Self {
        Self::new(name, Scope::Build)
    }

    pub fn run(name: &str) -> Self {
        Self::new(name, Scope::Run)
    }

    fn new(name: &str, scope: Scope) -> Self {
        Self {
            name: name.to_owned(),
            scope,
            required: false,
            default: None,
            kind: ValueKind::Text,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn url(mut self) -> Self {
        self.kind = ValueKind::Url;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_owned());
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_owned());
        self
    }
}

/// Default endpoint baked into the image when `APP_API_URL` is not provided.
pub const DEFAULT_API_URL: &str = "https://api.example.com";

/// Variables used when dockwright.toml declares none.
pub fn builtin_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec::build("APP_CLIENT_ID")
            .required()
            .describe("Client identifier compiled into the web bundle"),
        VariableSpec::build("APP_API_URL")
            .url()
            .with_default(DEFAULT_API_URL)
            .describe("Backend endpoint compiled into the web bundle"),
        VariableSpec::run("PORT").with_default("3000"),
        VariableSpec::run("HOSTNAME").with_default("0.0.0.0"),
        VariableSpec::run("NODE_ENV").with_default("production"),
        VariableSpec::run("LOG_LEVEL").with_default("info"),
    ]
}

/// Checks that `name` is usable as both an environment variable and a
/// Docker build argument.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err("must start with a letter or underscore");
        }
        Some(_) => {}
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err("may only contain ASCII letters, digits, and underscores")
    }
}

/// Parses a `NAME=VALUE` override.
pub fn parse_assignment(input: &str) -> crate::Result<(String, String)> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| crate::Error::InvalidVariableName {
            name: input.to_owned(),
            reason: "expected NAME=VALUE",
        })?;
    let name = name.trim();
    validate_name(name).map_err(|reason| crate::Error::InvalidVariableName {
        name: name.to_owned(),
        reason,
    })?;
    Ok((name.to_owned(), value.to_owned()))
}

// ── Sources ──

/// Source category. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Override,
    File,
    Environment,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Override => f.write_str("override"),
            SourceKind::File => f.write_str("file"),
            SourceKind::Environment => f.write_str("environment"),
        }
    }
}

/// A named, already-materialized set of values.
#[derive(Debug, Clone)]
pub struct Source {
    kind: SourceKind,
    label: String,
    values: BTreeMap<String, String>,
}

impl Source {
    pub fn new<I, K, V>(kind: SourceKind, label: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            kind,
            label: label.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn overrides<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(SourceKind::Override, "command line", values)
    }

    pub fn environment<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(SourceKind::Environment, "environment", values)
    }

    /// Reads a dotenv file. A missing file yields an empty source.
    pub fn dotenv(path: &Path) -> crate::Result<Self> {
        let label = path.display().to_string();
        if !path.exists() {
            tracing::debug!(path = %label, "no dotenv file, using empty source");
            return Ok(Self::new(
                SourceKind::File,
                label,
                std::iter::empty::<(String, String)>(),
            ));
        }

        let iter = dotenvy::from_path_iter(path).map_err(|e| crate::Error::DotenvRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut values = BTreeMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| crate::Error::DotenvRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            values.insert(key, value);
        }
        Ok(Self {
            kind: SourceKind::File,
            label,
            values,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Looks up a value. Empty strings count as undefined, since CI systems
    /// expand unset secrets to `""`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

// ── Resolution ──

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Source(SourceKind),
    Default,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Source(kind) => kind.fmt(f),
            Origin::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub name: String,
    pub value: String,
    pub scope: Scope,
    pub origin: Origin,
}

/// Effective values for one run. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationSet {
    values: BTreeMap<String, ResolvedValue>,
    unset: Vec<(String, Scope)>,
}

impl ConfigurationSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.value.as_str())
    }

    pub fn value(&self, name: &str) -> Option<&ResolvedValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedValue> {
        self.values.values()
    }

    pub fn scoped(&self, scope: Scope) -> impl Iterator<Item = &ResolvedValue> {
        self.values.values().filter(move |v| v.scope == scope)
    }

    /// Declared names that resolved to nothing (optional, or run-time).
    pub fn unset(&self) -> &[(String, Scope)] {
        &self.unset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Problem {
    #[error("{name}: required build-time value is not set")]
    Missing { name: String },

    #[error("{name}: '{value}' is not a valid URL ({reason})")]
    InvalidUrl {
        name: String,
        value: String,
        reason: String,
    },
}

impl Problem {
    pub fn name(&self) -> &str {
        match self {
            Problem::Missing { name } | Problem::InvalidUrl { name, .. } => name,
        }
    }
}

/// Every problem found while resolving build-time values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_problems(problems))]
pub struct ValidationError {
    pub problems: Vec<Problem>,
}

impl ValidationError {
    pub fn names(&self) -> Vec<&str> {
        self.problems.iter().map(Problem::name).collect()
    }
}

fn render_problems(problems: &[Problem]) -> String {
    let mut out = format!(
        "configuration is invalid ({} problem{}):",
        problems.len(),
        if problems.len() == 1 { "" } else { "s" }
    );
    for p in problems {
        out.push_str("\n  - ");
        out.push_str(&p.to_string());
    }
    out
}

/// Resolves `specs` against `sources`.
///
/// Sources are consulted in [`SourceKind`] order regardless of the order
/// they are passed in; ties keep their given order. All build-time
/// problems are collected before returning.
pub fn resolve(
    specs: &[VariableSpec],
    sources: &[Source],
) -> Result<ConfigurationSet, ValidationError> {
    let mut ordered: Vec<&Source> = sources.iter().collect();
    ordered.sort_by_key(|s| s.kind);

    let mut set = ConfigurationSet::default();
    let mut problems = Vec::new();

    for spec in specs {
        let found = ordered
            .iter()
            .find_map(|s| s.get(&spec.name).map(|v| (v, Origin::Source(s.kind))));
        let resolved = found.or_else(|| {
            spec.default
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(|d| (d, Origin::Default))
        });

        let Some((value, origin)) = resolved else {
            if spec.required && spec.scope == Scope::Build {
                problems.push(Problem::Missing {
                    name: spec.name.clone(),
                });
            }
            set.unset.push((spec.name.clone(), spec.scope));
            continue;
        };

        if spec.scope == Scope::Build && spec.kind == ValueKind::Url {
            if let Err(reason) = check_url(value) {
                problems.push(Problem::InvalidUrl {
                    name: spec.name.clone(),
                    value: value.to_owned(),
                    reason,
                });
            }
        }

        tracing::debug!(name = %spec.name, %origin, "resolved variable");
        set.values.insert(
            spec.name.clone(),
            ResolvedValue {
                name: spec.name.clone(),
                value: value.to_owned(),
                scope: spec.scope,
                origin,
            },
        );
    }

    if problems.is_empty() {
        Ok(set)
    } else {
        Err(ValidationError { problems })
    }
}

fn check_url(value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("scheme '{other}' is not http or https")),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("missing host".to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<VariableSpec> {
        builtin_variables()
    }

    #[test]
    fn scope_display_honours_width() {
        assert_eq!(format!("{:<5}|", Scope::Run), "run  |");
        assert_eq!(Scope::Build.to_string(), "build");
    }

    #[test]
    fn validate_name_accepts_env_style() {
        assert!(validate_name("APP_CLIENT_ID").is_ok());
        assert!(validate_name("_x1").is_ok());
    }

    #[test]
    fn validate_name_rejects_bad_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("1ABC").is_err());
        assert!(validate_name("A-B").is_err());
        assert!(validate_name("A B").is_err());
    }

    #[test]
    fn parse_assignment_keeps_equals_in_value() {
        let (k, v) = parse_assignment("APP_API_URL=https://x.test/?a=b").unwrap();
        assert_eq!(k, "APP_API_URL");
        assert_eq!(v, "https://x.test/?a=b");
    }

    #[test]
    fn parse_assignment_requires_equals() {
        assert!(parse_assignment("APP_CLIENT_ID").is_err());
    }

    #[test]
    fn override_beats_file_beats_environment() {
        let sources = vec![
            Source::environment([("APP_CLIENT_ID", "env")]),
            Source::new(SourceKind::File, ".env", [("APP_CLIENT_ID", "file")]),
            Source::overrides([("APP_CLIENT_ID", "cli")]),
        ];
        let set = resolve(&specs(), &sources).unwrap();
        let v = set.value("APP_CLIENT_ID").unwrap();
        assert_eq!(v.value, "cli");
        assert_eq!(v.origin, Origin::Source(SourceKind::Override));
    }

    #[test]
    fn file_beats_environment() {
        let sources = vec![
            Source::environment([("APP_CLIENT_ID", "env")]),
            Source::new(SourceKind::File, ".env", [("APP_CLIENT_ID", "file")]),
        ];
        let set = resolve(&specs(), &sources).unwrap();
        assert_eq!(set.get("APP_CLIENT_ID"), Some("file"));
    }

    #[test]
    fn empty_value_falls_through_to_next_source() {
        let sources = vec![
            Source::overrides([("APP_CLIENT_ID", "")]),
            Source::environment([("APP_CLIENT_ID", "env")]),
        ];
        let set = resolve(&specs(), &sources).unwrap();
        assert_eq!(set.get("APP_CLIENT_ID"), Some("env"));
    }

    #[test]
    fn default_applies_when_no_source_defines_value() {
        let sources = vec![Source::overrides([("APP_CLIENT_ID", "abc")])];
        let set = resolve(&specs(), &sources).unwrap();
        let url = set.value("APP_API_URL").unwrap();
        assert_eq!(url.value, DEFAULT_API_URL);
        assert_eq!(url.origin, Origin::Default);
    }

    #[test]
    fn missing_and_invalid_are_aggregated() {
        let sources = vec![Source::overrides([("APP_API_URL", "not a url")])];
        let err = resolve(&specs(), &sources).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert_eq!(err.names(), vec!["APP_CLIENT_ID", "APP_API_URL"]);
        let msg = err.to_string();
        assert!(msg.contains("2 problems"));
        assert!(msg.contains("APP_CLIENT_ID"));
        assert!(msg.contains("not a valid URL"));
    }

    #[test]
    fn every_missing_required_name_is_reported() {
        let specs = vec![
            VariableSpec::build("A").required(),
            VariableSpec::build("B").required(),
            VariableSpec::build("C").required().with_default("c"),
        ];
        let err = resolve(&specs, &[]).unwrap_err();
        assert_eq!(err.names(), vec!["A", "B"]);
    }

    #[test]
    fn non_http_scheme_is_invalid() {
        let sources = vec![Source::overrides([
            ("APP_CLIENT_ID", "abc"),
            ("APP_API_URL", "ftp://files.example.com"),
        ])];
        let err = resolve(&specs(), &sources).unwrap_err();
        assert!(matches!(err.problems[0], Problem::InvalidUrl { .. }));
    }

    #[test]
    fn runtime_values_are_never_validated() {
        let specs = vec![VariableSpec::run("SESSION_SECRET").required().url()];
        let set = resolve(&specs, &[Source::environment([("SESSION_SECRET", "x")])]).unwrap();
        assert_eq!(set.get("SESSION_SECRET"), Some("x"));

        let set = resolve(&specs, &[]).unwrap();
        assert_eq!(set.unset(), &[("SESSION_SECRET".to_owned(), Scope::Run)]);
    }

    #[test]
    fn scoped_filters_by_scope() {
        let sources = vec![Source::overrides([("APP_CLIENT_ID", "abc")])];
        let set = resolve(&specs(), &sources).unwrap();
        let build: Vec<_> = set.scoped(Scope::Build).map(|v| v.name.as_str()).collect();
        assert_eq!(build, vec!["APP_API_URL", "APP_CLIENT_ID"]);
        assert_eq!(set.scoped(Scope::Run).count(), 4);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn source_order_does_not_change_winner(
                cli in "[a-z]{0,6}",
                file in "[a-z]{0,6}",
                env in "[a-z]{0,6}",
                rotate in 0usize..3,
            ) {
                let mut sources = vec![
                    Source::overrides([("APP_CLIENT_ID", cli.clone())]),
                    Source::new(SourceKind::File, ".env", [("APP_CLIENT_ID", file.clone())]),
                    Source::environment([("APP_CLIENT_ID", env.clone())]),
                ];
                sources.rotate_left(rotate);

                let expected = [&cli, &file, &env].into_iter().find(|v| !v.is_empty()).cloned();
                match resolve(&specs(), &sources) {
                    Ok(set) => prop_assert_eq!(set.get("APP_CLIENT_ID").map(str::to_owned), expected),
                    Err(err) => {
                        prop_assert!(expected.is_none());
                        prop_assert_eq!(err.names(), vec!["APP_CLIENT_ID"]);
                    }
                }
            }
        }
    }
}
