use std::path::Path;

use super::build_pipeline::{self, EnvSnapshot};

/// Print every declared value with its scope and origin.
pub fn show_config(project_dir: &Path, overrides: &[String]) -> anyhow::Result<()> {
    let env = EnvSnapshot::capture();
    let prepared = build_pipeline::prepare(project_dir, overrides, &env)?;

    let width = prepared
        .values
        .iter()
        .map(|v| v.name.len())
        .chain(prepared.values.unset().iter().map(|(name, _)| name.len()))
        .max()
        .unwrap_or(0);

    for value in prepared.values.iter() {
        println!(
            "{:<width$}  {:<5}  {:<11}  {}",
            value.name,
            value.scope,
            value.origin.to_string(),
            value.value
        );
    }
    for (name, scope) in prepared.values.unset() {
        println!("{name:<width$}  {:<5}  {:<11}  (unset)", scope, "-");
    }
    Ok(())
}
