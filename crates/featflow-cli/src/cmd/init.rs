use crate::output::print_json;
use anyhow::Context;
use featflow_core::{
    config::{Config, WarnLevel},
    paths, Layout,
};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);
    let created = !config_path.exists();
    let cfg = if created {
        let cfg = Config::new();
        cfg.save(root).context("failed to write config.yaml")?;
        cfg
    } else {
        Config::load(root).context("failed to load config.yaml")?
    };

    let layout = Layout::from_config(root, &cfg);
    layout
        .ensure_roots_exist()
        .context("failed to create feature roots")?;

    let warnings = cfg.validate();

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "config_created": created,
            "roots": cfg.roots,
            "warnings": warnings,
        }));
    }

    println!("Initializing featflow in: {}", root.display());
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    for (label, dir) in [
        ("wip", &cfg.roots.wip),
        ("completed", &cfg.roots.completed),
        ("archive", &cfg.roots.archive),
    ] {
        println!("  {label:<10} {}", dir.display());
    }
    for w in &warnings {
        let tag = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("  {tag}: {}", w.message);
    }
    Ok(())
}
