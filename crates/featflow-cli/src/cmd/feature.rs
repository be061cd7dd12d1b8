use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use clap::Subcommand;
use featflow_core::{Feature, Lifecycle, Phase, Root};
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum FeatureSubcommand {
    /// Create a new feature in the work-in-progress root
    Create {
        name: String,
        /// Path to the parent feature's file
        #[arg(long)]
        parent: Option<String>,
        /// How this feature relates to its parent
        #[arg(long, requires = "parent")]
        relationship: Option<String>,
    },
    /// List features (work in progress by default)
    List {
        #[arg(long, conflicts_with = "archived")]
        completed: bool,
        #[arg(long)]
        archived: bool,
    },
    /// Show feature details
    Show { name: String },
    /// Transition a feature to a new phase
    Transition { name: String, phase: String },
    /// Finish execution: move to cleanup and into the completed root
    Complete { name: String },
    /// Reopen a completed feature for an improvement round
    Reopen {
        name: String,
        #[arg(long)]
        goal: String,
    },
    /// Close the open improvement record
    FinishImprovement { name: String },
    /// Record code and test paths produced for a feature
    Paths {
        name: String,
        #[arg(long = "code", num_args = 1..)]
        code: Vec<String>,
        #[arg(long = "test", num_args = 1..)]
        test: Vec<String>,
    },
    /// List planning documents
    Plans { name: String },
    /// Move a feature to the archive root
    Archive { name: String },
    /// Remove a feature's lock file
    Unlock { name: String },
}

pub fn run(root: &Path, subcmd: FeatureSubcommand, json: bool) -> anyhow::Result<()> {
    let lc = Lifecycle::open(root).context("failed to open project")?;
    match subcmd {
        FeatureSubcommand::Create {
            name,
            parent,
            relationship,
        } => create(&lc, &name, parent, relationship, json),
        FeatureSubcommand::List {
            completed,
            archived,
        } => {
            let root = if archived {
                Root::Archive
            } else if completed {
                Root::Completed
            } else {
                Root::Wip
            };
            list(&lc, root, json)
        }
        FeatureSubcommand::Show { name } => show(&lc, &name, json),
        FeatureSubcommand::Transition { name, phase } => transition(&lc, &name, &phase, json),
        FeatureSubcommand::Complete { name } => complete(&lc, &name, json),
        FeatureSubcommand::Reopen { name, goal } => reopen(&lc, &name, &goal, json),
        FeatureSubcommand::FinishImprovement { name } => finish_improvement(&lc, &name, json),
        FeatureSubcommand::Paths { name, code, test } => add_paths(&lc, &name, code, test, json),
        FeatureSubcommand::Plans { name } => plans(&lc, &name, json),
        FeatureSubcommand::Archive { name } => archive(&lc, &name, json),
        FeatureSubcommand::Unlock { name } => unlock(&lc, &name, json),
    }
}

fn load(lc: &Lifecycle, name: &str) -> anyhow::Result<Feature> {
    lc.load_feature(name)
        .with_context(|| format!("cannot load feature '{name}'"))
}

fn root_label(lc: &Lifecycle, feature: &Feature) -> String {
    lc.root_of(feature)
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn create(
    lc: &Lifecycle,
    name: &str,
    parent: Option<String>,
    relationship: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let feature = lc
        .create_feature(name, parent, relationship)
        .with_context(|| format!("failed to create feature '{name}'"))?;
    lc.unlock_feature(&feature)
        .context("failed to release creation lock")?;

    if json {
        print_json(&feature)?;
    } else {
        println!("Created feature: {name}");
        println!("File: {}", feature.manifest_path().display());
    }
    Ok(())
}

fn list(lc: &Lifecycle, root: Root, json: bool) -> anyhow::Result<()> {
    let features = match root {
        Root::Wip => lc.list_all(),
        Root::Completed => lc.list_completed(),
        Root::Archive => lc.list_archived(),
    }
    .context("failed to list features")?;

    if json {
        let summaries: Vec<_> = features
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "phase": f.phase.to_string(),
                    "root": root.to_string(),
                    "path": f.path,
                    "last_updated": f.last_updated,
                })
            })
            .collect();
        return print_json(&summaries);
    }

    if features.is_empty() {
        println!("No {root} features.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = features
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.phase.to_string(),
                f.last_updated.format("%Y-%m-%d %H:%M").to_string(),
                f.current_improvement()
                    .map(|n| n.goal.clone())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["NAME", "PHASE", "UPDATED", "IMPROVING"], &rows);
    Ok(())
}

fn show(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let feature = load(lc, name)?;
    let lock = lc
        .locks()
        .read(&feature)
        .context("failed to read lock file")?;

    if json {
        return print_json(&serde_json::json!({
            "feature": feature,
            "root": lc.root_of(&feature),
            "lock": lock,
        }));
    }

    println!("Feature: {}", feature.name);
    println!("Phase:   {}", feature.phase);
    println!("Root:    {}", root_label(lc, &feature));
    println!("Path:    {}", feature.path.display());
    println!("Created: {}", feature.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", feature.last_updated.format("%Y-%m-%d %H:%M"));
    if let Some(parent) = &feature.parent_feature {
        match &feature.parent_relationship {
            Some(rel) => println!("Parent:  {parent} ({rel})"),
            None => println!("Parent:  {parent}"),
        }
    }
    if let Some(lock) = lock {
        println!(
            "Locked:  by {} (pid {}) since {}",
            lock.locked_by,
            lock.pid,
            lock.locked_at.format("%Y-%m-%d %H:%M")
        );
    }

    for (label, items) in [("Code", &feature.code_paths), ("Tests", &feature.test_paths)] {
        if !items.is_empty() {
            println!("\n{label} ({}):", items.len());
            for p in items {
                println!("  {p}");
            }
        }
    }

    if !feature.improvement_history.is_empty() {
        println!("\nImprovements:");
        for note in &feature.improvement_history {
            let mark = if note.completed { "x" } else { " " };
            println!("  [{mark}] {} {}", note.date, note.goal);
        }
    }
    Ok(())
}

fn transition(lc: &Lifecycle, name: &str, phase_str: &str, json: bool) -> anyhow::Result<()> {
    let target = Phase::from_str(phase_str).with_context(|| format!("unknown phase: {phase_str}"))?;
    let mut feature = load(lc, name)?;
    let from = feature.phase;

    lc.with_lock(&mut feature, |lc, f| lc.transition_feature(f, target))
        .with_context(|| format!("cannot transition '{name}' to {target}"))?;

    if json {
        print_json(&serde_json::json!({
            "name": name,
            "from": from.to_string(),
            "phase": target.to_string(),
        }))?;
    } else {
        println!("Transitioned '{name}' from {from} to {target}");
    }
    Ok(())
}

fn complete(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let mut feature = load(lc, name)?;
    if feature.phase != Phase::Execution {
        bail!("feature '{name}' is in {} (expected execution)", feature.phase);
    }
    if lc.root_of(&feature) != Some(Root::Wip) {
        bail!("feature '{name}' is not in the work-in-progress root");
    }

    lc.with_lock(&mut feature, |lc, f| {
        lc.transition_feature(f, Phase::Cleanup)?;
        lc.move_feature(f, Root::Wip, Root::Completed)
    })
    .with_context(|| format!("cannot complete '{name}'"))?;

    if json {
        print_json(&feature)?;
    } else {
        println!("Completed '{name}': now in cleanup at {}", feature.path.display());
    }
    Ok(())
}

fn reopen(lc: &Lifecycle, name: &str, goal: &str, json: bool) -> anyhow::Result<()> {
    let mut feature = load(lc, name)?;
    if feature.phase != Phase::Complete {
        bail!("feature '{name}' is in {} (expected complete)", feature.phase);
    }

    lc.with_lock(&mut feature, |lc, f| {
        lc.transition_feature(f, Phase::Description)?;
        if lc.root_of(f) == Some(Root::Completed) {
            lc.move_feature(f, Root::Completed, Root::Wip)?;
        }
        f.add_improvement_note(goal);
        lc.save_feature(f)
    })
    .with_context(|| format!("cannot reopen '{name}'"))?;

    if json {
        print_json(&feature)?;
    } else {
        println!("Reopened '{name}' for: {goal}");
    }
    Ok(())
}

fn finish_improvement(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let mut feature = load(lc, name)?;

    let closed = lc
        .with_lock(&mut feature, |lc, f| {
            let closed = f.mark_current_improvement_complete();
            if closed {
                lc.save_feature(f)?;
            }
            Ok(closed)
        })
        .with_context(|| format!("cannot update '{name}'"))?;

    if !closed {
        bail!("feature '{name}' has no open improvement");
    }
    if json {
        print_json(&feature.improvement_history)?;
    } else {
        println!("Closed improvement on '{name}'");
    }
    Ok(())
}

fn add_paths(
    lc: &Lifecycle,
    name: &str,
    code: Vec<String>,
    test: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    if code.is_empty() && test.is_empty() {
        bail!("nothing to record: pass --code and/or --test");
    }
    let mut feature = load(lc, name)?;
    let (n_code, n_test) = (code.len(), test.len());

    lc.with_lock(&mut feature, |lc, f| {
        if !code.is_empty() {
            f.add_code_paths(code);
        }
        if !test.is_empty() {
            f.add_test_paths(test);
        }
        lc.save_feature(f)
    })
    .with_context(|| format!("cannot record paths for '{name}'"))?;

    if json {
        print_json(&serde_json::json!({
            "name": name,
            "code_paths": feature.code_paths,
            "test_paths": feature.test_paths,
        }))?;
    } else {
        println!("Recorded {n_code} code and {n_test} test path(s) on '{name}'");
    }
    Ok(())
}

fn plans(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let feature = load(lc, name)?;
    let docs = lc
        .planning_documents(&feature)
        .context("failed to scan planning directory")?;

    if json {
        return print_json(&docs);
    }
    if docs.is_empty() {
        println!("No planning documents for '{name}'.");
        return Ok(());
    }
    for doc in &docs {
        println!("{}", doc.relative_path);
    }
    Ok(())
}

fn archive(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let mut feature = load(lc, name)?;
    lc.archive_feature(&mut feature)
        .with_context(|| format!("cannot archive '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "name": name, "path": feature.path }))?;
    } else {
        println!("Archived '{name}' to {}", feature.path.display());
    }
    Ok(())
}

fn unlock(lc: &Lifecycle, name: &str, json: bool) -> anyhow::Result<()> {
    let feature = load(lc, name)?;
    let previous = lc.locks().read(&feature).ok().flatten();
    lc.unlock_feature(&feature)
        .with_context(|| format!("cannot unlock '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "name": name, "released": previous }))?;
    } else {
        match previous {
            Some(info) => println!("Released lock on '{name}' held by {}", info.locked_by),
            None => println!("'{name}' was not locked"),
        }
    }
    Ok(())
}
