//! CLI command implementations

use crate::CriteriaAction;
use anyhow::{Context, bail};
use flowform_convert::{ConvertConfig, Exporter, ImportedFlow, Importer};
use flowform_core::{CriteriaCatalog, CriterionRef, GraphIssue, check_graph, compare};
use std::fs;
use std::path::Path;

/// Options of the `export` command.
#[derive(Debug, Default)]
pub struct ExportOptions {
    pub name: Option<String>,
    pub with_layout: bool,
    pub catalog: Option<std::path::PathBuf>,
    pub force: bool,
}

/// Load `path`, or `flowform.toml` from the working directory, then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ConvertConfig> {
    let mut config = match path {
        Some(path) => ConvertConfig::load(path)?,
        None => ConvertConfig::discover(Path::new("."))?,
    };
    config.apply_env()?;
    Ok(config)
}

pub fn export(config: &ConvertConfig, input: &Path, output: Option<&Path>, options: &ExportOptions) -> anyhow::Result<()> {
    let flow = read_flow(config, input, None)?;

    let issues = check_graph(&flow.graph);
    for issue in &issues {
        tracing::warn!("{}", issue);
    }
    if issues.contains(&GraphIssue::MissingStart) && !options.force {
        bail!("{} has no start node (use --force to export anyway)", input.display());
    }

    let name = options.name.as_deref().or(flow.name()).unwrap_or_default();
    if name.trim().is_empty() {
        tracing::warn!("Graph has no name, using '{}'", config.default_name);
    }
    let name = config.resolve_name(name);

    let catalog = options.catalog.as_deref().map(load_catalog).transpose()?;
    let exporter = Exporter::new().embed_layout(config.embed_layout || options.with_layout);
    let mut exporter = match &catalog {
        Some(catalog) => exporter.with_catalog(catalog),
        None => exporter,
    };
    let batch = exporter.export_graph(name, &flow.graph);
    tracing::info!("Exported '{}' as {} records", name, batch.len());

    write_output(output, &batch.to_json_pretty()?)
}

pub fn import(config: &ConvertConfig, input: &Path, output: Option<&Path>, catalog: Option<&Path>) -> anyhow::Result<()> {
    let catalog = catalog.map(load_catalog).transpose()?;
    let flow = read_flow(config, input, catalog.as_ref())?;
    write_output(output, &serde_json::to_string_pretty(&flow)?)
}

/// Import, export with fresh keys, import again, and fail if anything but layout changed.
pub fn roundtrip(config: &ConvertConfig, input: &Path) -> anyhow::Result<()> {
    let first = read_flow(config, input, None)?;
    let name = config.resolve_name(first.name().unwrap_or_default());
    let batch = Exporter::new().embed_layout(true).export_graph(name, &first.graph);
    let second = Importer::with_config(config).import_batch(&batch)?;

    let diff = compare(&first.graph, &second.graph);
    if !diff.is_empty() {
        bail!("Round trip changed {} items: {:?}", diff.change_count(), diff);
    }
    println!(
        "Round trip preserved {} nodes and {} edges ({} records)",
        second.graph.nodes.len(),
        second.graph.edges.len(),
        batch.len()
    );
    Ok(())
}

pub fn criteria(path: &Path, action: CriteriaAction) -> anyhow::Result<()> {
    let catalog = if path.exists() {
        load_catalog(path)?
    } else {
        tracing::info!("{} not found, starting from the default criteria", path.display());
        CriteriaCatalog::default_node_criteria()
    };

    match action {
        CriteriaAction::List => {
            for criterion in catalog.get_all() {
                println!("{}\t{}\t{}", criterion.id, criterion.value, criterion.label);
            }
            return Ok(());
        }
        CriteriaAction::Add { value, label, id } => {
            let stored = catalog.add(CriterionRef::new(id.unwrap_or_default(), value, label));
            tracing::info!("Added criterion {} ({})", stored.id, stored.label);
        }
        CriteriaAction::Remove { id } => {
            if catalog.delete(&id).is_none() {
                bail!("No criterion with id {}", id);
            }
            tracing::info!("Removed criterion {}", id);
        }
    }

    fs::write(path, catalog.to_json_pretty()?).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_flow(config: &ConvertConfig, input: &Path, catalog: Option<&CriteriaCatalog>) -> anyhow::Result<ImportedFlow> {
    let text = fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let importer = Importer::with_config(config);
    let importer = match catalog {
        Some(catalog) => importer.with_catalog(catalog),
        None => importer,
    };
    importer
        .import_str(&text)
        .with_context(|| format!("Failed to import {}", input.display()))
}

fn load_catalog(path: &Path) -> anyhow::Result<CriteriaCatalog> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read catalog {}", path.display()))?;
    CriteriaCatalog::from_json(&text).with_context(|| format!("Invalid catalog {}", path.display()))
}

fn write_output(output: Option<&Path>, json: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
