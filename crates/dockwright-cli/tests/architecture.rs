use std::path::Path;

use arch_lint::rules::{NoErrorSwallowing, NoSilentResultDrop};
use arch_lint::{Analyzer, Severity};

/// Library and binary sources checked for swallowed errors and dropped results.
const CRATE_SOURCES: &[&str] = &[
    "crates/dockwright-core/src",
    "crates/dockwright-build/src",
    "crates/dockwright-release/src",
    "crates/dockwright-cli/src",
];

/// AL003 (no-error-swallowing) and AL013 (no-silent-result-drop) over every
/// dockwright crate. Integration tests under `tests/` are not scanned.
#[test]
fn no_swallowed_errors_in_dockwright_crates() {
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    let mut reports = Vec::new();
    for sources in CRATE_SOURCES {
        let root = workspace.join(sources);
        assert!(root.is_dir(), "missing crate sources at {}", root.display());

        let analyzer = Analyzer::builder()
            .root(root.as_path())
            .exclude("**/target/**")
            .rule(NoErrorSwallowing::new())
            .rule(NoSilentResultDrop::new())
            .build()
            .expect("build analyzer");
        let result = analyzer.analyze().expect("analyze");

        if result.has_violations_at(Severity::Warning) {
            reports.push(result.format_test_report(Severity::Warning).to_string());
        }
    }

    assert!(reports.is_empty(), "{}", reports.join("\n"));
}
