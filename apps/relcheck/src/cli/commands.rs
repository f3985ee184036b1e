//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Outcome;
use relcheck_core::{
    CheckerConfig, CompositeChecker, Diagnostics, EntityGraph, EntityId, Fix,
    GrammarCache, GrammarEntry, GrammarSource, RuleRunner, TracingProgress, ValidatorError,
    dataset_from_json, dataset_to_json, grammar_from_toml, would_create_cycle,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a data set file (256 MB).
const MAX_DATA_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Maximum size of a grammar file (16 MB).
const MAX_GRAMMAR_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), ValidatorError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ValidatorError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(ValidatorError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, ValidatorError> {
    let canonical = path.canonicalize().map_err(|e| {
        ValidatorError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(ValidatorError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// For output files, the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, ValidatorError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        ValidatorError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(ValidatorError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| ValidatorError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_text(path: &Path, max_size: u64) -> Result<String, ValidatorError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read_to_string(&validated)
        .map_err(|e| ValidatorError::IoError(format!("Read '{}': {}", path.display(), e)))
}

// =============================================================================
// INPUTS
// =============================================================================

/// Load a JSON data set from disk.
pub fn load_data_set(path: &Path) -> Result<EntityGraph, ValidatorError> {
    let text = read_text(path, MAX_DATA_FILE_SIZE)?;
    let graph = dataset_from_json(&text)?;
    tracing::info!("Loaded {} entities from {}", graph.len(), path.display());
    Ok(graph)
}

/// Role grammar read from a TOML file on every (re)build.
#[derive(Debug, Clone)]
pub struct TomlGrammarFile {
    path: PathBuf,
}

impl TomlGrammarFile {
    /// Grammar backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GrammarSource for TomlGrammarFile {
    fn load(&self) -> Result<Vec<GrammarEntry>, ValidatorError> {
        let text = read_text(&self.path, MAX_GRAMMAR_FILE_SIZE).map_err(|e| {
            ValidatorError::GrammarUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        grammar_from_toml(&text)
    }
}

/// Parse `kind/id` selections.
pub fn parse_selection(select: &[String]) -> Result<Vec<EntityId>, ValidatorError> {
    select.iter().map(|s| s.trim().parse::<EntityId>()).collect()
}

fn build_runner(grammar: &Path, config: CheckerConfig) -> RuleRunner<CompositeChecker> {
    let cache = Arc::new(GrammarCache::new(TomlGrammarFile::new(grammar)));
    let mut runner = RuleRunner::new(CompositeChecker::new(cache, config));
    runner.set_show_element_count(config.show_element_count);
    runner
}

fn validate_graph(
    runner: &mut RuleRunner<CompositeChecker>,
    graph: &EntityGraph,
    selection: &[EntityId],
) -> Result<Diagnostics, ValidatorError> {
    let progress = TracingProgress::new();
    runner.validate(graph, selection, Some(Box::new(progress)))
}

fn write_out(out: &mut dyn Write, text: &str) -> Result<(), ValidatorError> {
    writeln!(out, "{}", text).map_err(|e| ValidatorError::IoError(e.to_string()))
}

fn to_json(value: &impl serde::Serialize) -> Result<String, ValidatorError> {
    serde_json::to_string_pretty(value).map_err(|e| ValidatorError::SerializationError(e.to_string()))
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Run the composite checker and print its diagnostics.
pub fn cmd_check(
    data: &Path,
    grammar: &Path,
    select: &[String],
    config: CheckerConfig,
    json_mode: bool,
    out: &mut dyn Write,
) -> Result<Outcome, ValidatorError> {
    let graph = load_data_set(data)?;
    let mut runner = build_runner(grammar, config);

    let selection = if select.is_empty() {
        graph.ids()
    } else {
        runner.set_partial_selection(true);
        parse_selection(select)?
    };

    let diagnostics = validate_graph(&mut runner, &graph, &selection)?;
    let outcome = if diagnostics.has_errors() {
        Outcome::ErrorsFound
    } else {
        Outcome::Clean
    };

    if json_mode {
        write_out(out, &to_json(&diagnostics)?)?;
        return Ok(outcome);
    }

    for d in diagnostics.iter() {
        write_out(out, &d.to_string())?;
    }
    write_out(
        out,
        &format!(
            "{} diagnostics ({} errors, {} warnings) over {} entities",
            diagnostics.len(),
            diagnostics.count_severity(relcheck_core::Severity::Error),
            diagnostics.count_severity(relcheck_core::Severity::Warning),
            selection.len()
        ),
    )?;

    Ok(outcome)
}

// =============================================================================
// WOULD-CYCLE COMMAND
// =============================================================================

/// Ask whether linking `child` into `parent` would close a loop.
pub fn cmd_would_cycle(
    data: &Path,
    parent: &str,
    child: &str,
    allow_complex_loops: bool,
    json_mode: bool,
    out: &mut dyn Write,
) -> Result<Outcome, ValidatorError> {
    let graph = load_data_set(data)?;
    let parent: EntityId = parent.trim().parse()?;
    let child: EntityId = child.trim().parse()?;

    let path = would_create_cycle(&graph, parent, child, allow_complex_loops);
    let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();

    if json_mode {
        let output = serde_json::json!({
            "parent": parent.to_string(),
            "child": child.to_string(),
            "creates_loop": !path.is_empty(),
            "loop": rendered,
        });
        write_out(out, &to_json(&output)?)?;
    } else if path.is_empty() {
        write_out(out, &format!("Adding {} to {} is safe", child, parent))?;
    } else {
        write_out(out, &format!("Adding {} to {} creates a loop:", child, parent))?;
        write_out(out, &format!("  {}", rendered.join(" -> ")))?;
    }

    Ok(if path.is_empty() {
        Outcome::Clean
    } else {
        Outcome::ErrorsFound
    })
}

// =============================================================================
// FIX COMMAND
// =============================================================================

/// Validate, apply every available fix and write the data set.
pub fn cmd_fix(
    data: &Path,
    grammar: &Path,
    output: &Path,
    config: CheckerConfig,
    json_mode: bool,
    out: &mut dyn Write,
) -> Result<Outcome, ValidatorError> {
    let mut graph = load_data_set(data)?;
    let output = validate_output_path(output)?;
    let mut runner = build_runner(grammar, config);

    let diagnostics = validate_graph(&mut runner, &graph, &graph.ids())?;
    let fixes: Vec<Fix> = diagnostics
        .iter()
        .filter_map(|d| runner.fix(d, &graph))
        .collect();

    let mut applied = Vec::with_capacity(fixes.len());
    for fix in &fixes {
        fix.apply(&mut graph)?;
        tracing::debug!("Applied fix: {}", fix.describe());
        applied.push(fix.describe());
    }

    let text = dataset_to_json(&graph)?;
    std::fs::write(&output, text)
        .map_err(|e| ValidatorError::IoError(format!("Write '{}': {}", output.display(), e)))?;

    let remaining = diagnostics.len().saturating_sub(applied.len());
    if json_mode {
        let summary = serde_json::json!({
            "output": output.to_string_lossy(),
            "applied": applied,
            "unfixed": remaining,
        });
        write_out(out, &to_json(&summary)?)?;
    } else {
        for line in &applied {
            write_out(out, line)?;
        }
        write_out(
            out,
            &format!(
                "Applied {} fixes, {} diagnostics left unfixed; wrote {}",
                applied.len(),
                remaining,
                output.display()
            ),
        )?;
    }

    Ok(Outcome::Clean)
}

// =============================================================================
// GRAMMAR COMMAND
// =============================================================================

/// List the loaded grammar entries and roles.
pub fn cmd_grammar(grammar: &Path, json_mode: bool, out: &mut dyn Write) -> Result<Outcome, ValidatorError> {
    let entries = TomlGrammarFile::new(grammar).load()?;

    if json_mode {
        let listing: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                let roles: Vec<serde_json::Value> = entry
                    .roles
                    .iter()
                    .map(|role| {
                        serde_json::json!({
                            "key": role.key,
                            "regexp": role.is_pattern(),
                            "types": role.types.iter().map(|t| t.name()).collect::<Vec<_>>(),
                            "count": role.count.to_string(),
                            "member_expression": role.member_expression.as_ref().map(|e| e.source().to_string()),
                        })
                    })
                    .collect();
                serde_json::json!({ "name": entry.name, "roles": roles })
            })
            .collect();
        write_out(out, &to_json(&listing)?)?;
        return Ok(Outcome::Clean);
    }

    for entry in &entries {
        let conditions: Vec<String> = entry
            .conditions
            .iter()
            .map(|c| {
                if c.values.is_empty() {
                    c.key.clone()
                } else {
                    format!("{}={}", c.key, c.values.join("|"))
                }
            })
            .collect();
        write_out(out, &format!("{} [{}]", entry.name, conditions.join(", ")))?;
        for role in &entry.roles {
            let key = if role.key.is_empty() { "<empty>" } else { role.key.as_str() };
            let types: Vec<&str> = role.types.iter().map(|t| t.name()).collect();
            let mut line = format!("  {} count={}", key, role.count);
            if !types.is_empty() {
                line.push_str(&format!(" types={}", types.join("/")));
            }
            if let Some(expression) = &role.member_expression {
                line.push_str(&format!(" member={}", expression.source()));
            }
            write_out(out, &line)?;
        }
    }
    write_out(out, &format!("{} grammar entries", entries.len()))?;

    Ok(Outcome::Clean)
}
