//! SARIF 2.1.0 rendering of scan results.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::scan::{Finding, ScanReport, Severity};

pub const SARIF_VERSION: &str = "2.1.0";
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

#[derive(Debug, Serialize)]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub version: &'static str,
    pub runs: Vec<Run>,
}

#[derive(Debug, Serialize)]
pub struct Run {
    pub tool: Tool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub driver: Driver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_uri: Option<String>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub short_description: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_uri: Option<String>,
    pub properties: RuleProperties,
}

#[derive(Debug, Serialize)]
pub struct RuleProperties {
    pub severity: Severity,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: &'static str,
    pub message: Message,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub physical_location: PhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation {
    pub artifact_location: ArtifactLocation,
}

#[derive(Debug, Serialize)]
pub struct ArtifactLocation {
    pub uri: String,
}

fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Unknown => "note",
    }
}

fn message(finding: &Finding) -> String {
    let mut text = format!(
        "{} {} in {} {}",
        finding.severity, finding.id, finding.package, finding.installed_version
    );
    if let Some(fixed) = &finding.fixed_version {
        text.push_str(&format!(" (fixed in {fixed})"));
    }
    if let Some(title) = &finding.title {
        text.push_str(": ");
        text.push_str(title);
    }
    text
}

/// One rule per vulnerability id, one result per finding.
pub fn to_sarif(report: &ScanReport, scanner: &str) -> SarifLog {
    let mut rules: BTreeMap<&str, &Finding> = BTreeMap::new();
    for finding in &report.findings {
        rules.entry(finding.id.as_str()).or_insert(finding);
    }

    let rules = rules
        .into_values()
        .map(|f| Rule {
            id: f.id.clone(),
            short_description: Message {
                text: f.title.clone().unwrap_or_else(|| f.id.clone()),
            },
            help_uri: f.url.clone(),
            properties: RuleProperties {
                severity: f.severity,
            },
        })
        .collect();

    let results = report
        .findings
        .iter()
        .map(|f| SarifResult {
            rule_id: f.id.clone(),
            level: level(f.severity),
            message: Message { text: message(f) },
            locations: vec![Location {
                physical_location: PhysicalLocation {
                    artifact_location: ArtifactLocation {
                        uri: f.target.clone(),
                    },
                },
            }],
        })
        .collect();

    SarifLog {
        schema: SARIF_SCHEMA,
        version: SARIF_VERSION,
        runs: vec![Run {
            tool: Tool {
                driver: Driver {
                    name: scanner.to_owned(),
                    information_uri: (scanner == "trivy")
                        .then(|| "https://github.com/aquasecurity/trivy".to_owned()),
                    rules,
                },
            },
            results,
        }],
    }
}

pub fn write_sarif(log: &SarifLog, path: &Path) -> Result<(), SarifError> {
    let json = serde_json::to_string_pretty(log).map_err(SarifError::Serialize)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SarifError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, json).map_err(|e| SarifError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SarifError {
    #[error("failed to serialize SARIF report")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write SARIF report to {path}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
