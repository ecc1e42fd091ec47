use std::path::Path;

use dockwright_core::DockwrightConfig;
use dockwright_release::{ReleaseContext, TagRules, derive_tags};

use super::EventInput;

pub fn tags(project_dir: &Path, input: &EventInput, json: bool) -> anyhow::Result<()> {
    let config = DockwrightConfig::load(project_dir)?;
    let context = ReleaseContext::parse(&input.event, &input.git_ref, &input.sha)?;
    let tags = derive_tags(&context.reference, &context.commit, &tag_rules(&config))?;

    if json {
        let names: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        println!("{}", serde_json::to_string(&names)?);
    } else {
        for tag in &tags {
            println!("{tag}");
        }
    }
    Ok(())
}

pub(super) fn tag_rules(config: &DockwrightConfig) -> TagRules {
    TagRules {
        default_branch: config.project.default_branch.clone(),
        scan_tag: config.scan.tag.clone(),
    }
}
