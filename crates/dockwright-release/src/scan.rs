use dockwright_build::ToolError;
use dockwright_build::executor::{RealExecutor, ToolExecutor};
use serde::{Deserialize, Serialize};

pub use dockwright_core::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub id: String,
    pub package: String,
    pub installed_version: String,
    pub fixed_version: Option<String>,
    pub severity: Severity,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Scanned layer or file, as reported by the scanner
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub image: String,
    pub threshold: Severity,
    /// Findings at or above the threshold, most severe first
    pub findings: Vec<Finding>,
    /// Findings below the threshold
    pub below_threshold: usize,
}

impl ScanReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scanner failed")]
    Tool(#[from] ToolError),

    #[error("failed to parse scanner output")]
    Parse(#[from] serde_json::Error),
}

/// Runs an image vulnerability scanner with trivy's JSON interface.
pub struct Scanner<E: ToolExecutor = RealExecutor> {
    executor: E,
    program: String,
}

impl Scanner<RealExecutor> {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            executor: RealExecutor,
            program: program.into(),
        }
    }
}

impl<E: ToolExecutor> Scanner<E> {
    pub fn with_executor(executor: E, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    pub async fn scan(&self, image: &str, threshold: Severity) -> Result<ScanReport, ScanError> {
        let args: Vec<String> = ["image", "--format", "json", "--quiet", image]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        tracing::info!(%image, scanner = %self.program, "scanning image");
        let output = self.executor.exec(&self.program, &args).await?;

        let findings = parse_trivy(&output)?;
        let total = findings.len();
        let findings = filter(findings, threshold);
        tracing::info!(
            %image,
            reported = findings.len(),
            below_threshold = total - findings.len(),
            %threshold,
            "scan finished"
        );

        Ok(ScanReport {
            image: image.to_owned(),
            threshold,
            below_threshold: total - findings.len(),
            findings,
        })
    }
}

/// Keep findings at or above `threshold`, most severe first.
pub fn filter(findings: Vec<Finding>, threshold: Severity) -> Vec<Finding> {
    let mut kept: Vec<Finding> = findings
        .into_iter()
        .filter(|f| f.severity >= threshold)
        .collect();
    kept.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));
    kept
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyReport {
    #[serde(default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyResult {
    target: String,
    #[serde(default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: String,
    pkg_name: String,
    #[serde(default)]
    installed_version: String,
    #[serde(default)]
    fixed_version: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "PrimaryURL", default)]
    primary_url: Option<String>,
}

/// Parse `trivy image --format json` output.
pub fn parse_trivy(json: &str) -> Result<Vec<Finding>, ScanError> {
    let report: TrivyReport = serde_json::from_str(json)?;
    let findings = report
        .results
        .unwrap_or_default()
        .into_iter()
        .flat_map(|result| {
            let target = result.target;
            result
                .vulnerabilities
                .unwrap_or_default()
                .into_iter()
                .map(move |v| Finding {
                    id: v.vulnerability_id,
                    package: v.pkg_name,
                    installed_version: v.installed_version,
                    fixed_version: v.fixed_version.filter(|s| !s.is_empty()),
                    severity: v
                        .severity
                        .as_deref()
                        // arch-lint: allow(no-silent-result-drop) reason="severities the scanner invents are reported as UNKNOWN"
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(Severity::Unknown),
                    title: v.title,
                    url: v.primary_url,
                    target: target.clone(),
                })
        })
        .collect();
    Ok(findings)
}
