use std::path::Path;

use dockwright_build::dockerfile::DockerfileGenerator;
use dockwright_core::{DockwrightConfig, ProjectLayout};

pub fn eject(project_dir: &Path) -> anyhow::Result<()> {
    let config = DockwrightConfig::load(project_dir)?;
    let layout = ProjectLayout::inspect(project_dir, &config.app)?;
    let specs = config.variable_specs();

    let dockerfile =
        DockerfileGenerator::new(&config.build, &config.app, &layout, &specs).render();
    let path = dockwright_build::eject::eject(project_dir, &dockerfile)?;

    println!("Ejected Dockerfile to {}", path.display());
    println!("You can now edit it directly. dockwright build will use this file.");
    Ok(())
}
