//! Build descriptor synthesis.
//!
//! Merges the file sets, parameters and tool options of a resolved closure
//! into one backend-agnostic build descriptor. Cores are visited in
//! dependency-first order, so declarations nearer the root come later and
//! override earlier ones.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::config::Settings;
use crate::core_file::{Datatype, Paramtype};
use crate::error::{CoreError, Result};
use crate::flags::Flags;
use crate::resolution::ResolvedClosure;
use crate::vlnv::Vlnv;

/// One source file in a build descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Path relative to `root`, as declared.
    pub path: PathBuf,
    /// The directory the declaring core's files are relative to.
    pub root: PathBuf,
    pub file_type: Option<String>,
    pub is_include_file: bool,
    pub logical_name: Option<String>,
    pub core: Vlnv,
    pub file_set: String,
}

impl FileRecord {
    pub fn full_path(&self) -> PathBuf {
        self.root.join(&self.path)
    }
}

/// A parameter after merging across the closure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedParameter {
    pub datatype: Datatype,
    pub paramtype: Option<Paramtype>,
    pub default: Option<toml::Value>,
    pub description: Option<String>,
    /// The core whose declaration won.
    pub declared_by: Vlnv,
}

/// The synthesized, immutable record handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildDescriptor {
    pub name: Vlnv,
    pub flow: String,
    pub target: String,
    pub tool: String,
    pub toplevel: Option<String>,
    pub flags: Flags,
    /// Dependency-first, not deduplicated.
    pub files: Vec<FileRecord>,
    pub parameters: BTreeMap<String, MergedParameter>,
    /// Options for `tool`, merged across the closure.
    pub tool_options: toml::Table,
    /// Direct dependencies of every core in the closure, keyed by identity.
    pub dependencies: BTreeMap<String, Vec<Vlnv>>,
}

/// Synthesize a build descriptor from a resolved closure.
///
/// The flow, target and use-flags are those the closure was resolved
/// with. `tool` overrides the root target's default tool.
pub fn synthesize(
    closure: &ResolvedClosure,
    tool: Option<&str>,
    settings: &Settings,
) -> Result<BuildDescriptor> {
    let root = closure.root_core();
    let selection = &closure.selection;
    let target_name = root
        .target_name
        .clone()
        .unwrap_or_else(|| selection.root_target().to_string());

    let tool = select_tool(closure, tool)?;
    debug!(core = %closure.root, tool = %tool, "synthesizing build descriptor");

    let files = merge_files(closure, &selection.flags, settings);
    let parameters = merge_parameters(closure)?;
    let tool_options = merge_tool_options(closure, &tool);
    let dependencies = closure
        .cores
        .iter()
        .map(|c| (c.identity().to_string(), c.dependencies.clone()))
        .collect();

    Ok(BuildDescriptor {
        name: closure.root.clone(),
        flow: selection.flow.clone(),
        target: target_name,
        tool,
        toplevel: root.target().and_then(|t| t.toplevel.clone()),
        flags: selection.flags.clone(),
        files,
        parameters,
        tool_options,
        dependencies,
    })
}

/// Pick the tool: an explicit choice must be configured for the root
/// target, otherwise the target's default tool is used.
pub fn select_tool(closure: &ResolvedClosure, tool: Option<&str>) -> Result<String> {
    let root = closure.root_core();
    let core = closure.root.to_string();
    let flow = closure.selection.root_target().to_string();
    let target = root.target();

    match tool {
        Some(tool) => {
            let mut available: Vec<String> = target
                .map(|t| t.tools().map(str::to_string).collect())
                .unwrap_or_default();
            if let Some(default) = target.and_then(|t| t.default_tool.clone()) {
                if !available.contains(&default) {
                    available.push(default);
                }
            }
            if available.iter().any(|t| t == tool) {
                Ok(tool.to_string())
            } else {
                available.sort();
                Err(CoreError::UnsupportedTool {
                    core,
                    flow,
                    tool: tool.to_string(),
                    available,
                })
            }
        }
        None => target
            .and_then(|t| t.default_tool.clone())
            .ok_or(CoreError::NoToolConfigured { core, flow }),
    }
}

/// Files of every active file set, dependency-first.
pub fn merge_files(closure: &ResolvedClosure, flags: &Flags, settings: &Settings) -> Vec<FileRecord> {
    let mut files = Vec::new();
    for resolved in &closure.cores {
        let root = resolved.core.files_root(&settings.cache_root);
        for fs in resolved.active_file_sets(flags) {
            files.extend(fs.files.iter().map(|f| FileRecord {
                path: f.path.clone(),
                root: root.clone(),
                file_type: f.file_type.clone(),
                is_include_file: f.is_include_file,
                logical_name: f.logical_name.clone(),
                core: resolved.identity().clone(),
                file_set: fs.name.clone(),
            }));
        }
    }
    files
}

/// Union of all exposed parameters; later declarations override earlier
/// defaults, but a datatype mismatch is an error.
pub fn merge_parameters(closure: &ResolvedClosure) -> Result<BTreeMap<String, MergedParameter>> {
    let mut merged: BTreeMap<String, MergedParameter> = BTreeMap::new();
    for resolved in &closure.cores {
        for (name, param) in resolved.exposed_parameters() {
            if let Some(existing) = merged.get(name) {
                if existing.datatype != param.datatype {
                    return Err(CoreError::ParameterConflict {
                        name: name.to_string(),
                        first: existing.datatype.as_str().to_string(),
                        first_core: existing.declared_by.to_string(),
                        second: param.datatype.as_str().to_string(),
                        second_core: resolved.identity().to_string(),
                    });
                }
            }
            let description = param
                .description
                .clone()
                .or_else(|| merged.get(name).and_then(|p| p.description.clone()));
            merged.insert(
                name.to_string(),
                MergedParameter {
                    datatype: param.datatype,
                    paramtype: param.paramtype,
                    default: param.default.clone(),
                    description,
                    declared_by: resolved.identity().clone(),
                },
            );
        }
    }
    Ok(merged)
}

/// Options for `tool` from every core's selected target. Arrays
/// concatenate in build order; other values are overridden.
pub fn merge_tool_options(closure: &ResolvedClosure, tool: &str) -> toml::Table {
    let mut merged = toml::Table::new();
    for resolved in &closure.cores {
        let Some(options) = resolved.target().and_then(|t| t.tool_options.get(tool)) else {
            continue;
        };
        for (key, value) in options {
            match (merged.get_mut(key), value) {
                (Some(toml::Value::Array(existing)), toml::Value::Array(more)) => {
                    existing.extend(more.iter().cloned());
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    merged
}
