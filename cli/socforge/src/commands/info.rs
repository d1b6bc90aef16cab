//! `socforge core-info`: describe one core and optionally its dependency tree.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use socforge_core::{format_closure, resolve, CoreDescriptor, Selection};

use crate::session::Session;

/// Run `socforge core-info <core> [--deps] [--flow <flow>]`.
pub fn run(session: &Session, name: &str, deps: bool, flow: &str) -> Result<()> {
    print!("{}", render(session, name, deps, flow)?);
    Ok(())
}

pub fn render(session: &Session, name: &str, deps: bool, flow: &str) -> Result<String> {
    let core = session.core(name)?;
    let mut out = describe(&core, session)?;

    if deps {
        let closure = resolve(&session.registry, &core.identity, &Selection::new(flow))
            .with_context(|| format!("resolving dependencies of {} for '{flow}'", core.identity))?;
        writeln!(out, "\nDependencies ({flow}):")?;
        out.push_str(&format_closure(&closure));
    }
    Ok(out)
}

fn describe(core: &CoreDescriptor, session: &Session) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "CORE INFO")?;
    writeln!(out, "Name:        {}", core.identity)?;
    writeln!(out, "Core root:   {}", core.core_root.display())?;
    writeln!(out, "Core file:   {}", core.core_file.display())?;
    if let Some(description) = &core.description {
        writeln!(out, "Description: {description}")?;
    }
    if let Some(provider) = &core.provider {
        let location = provider.location().unwrap_or("-");
        writeln!(
            out,
            "Provider:    {:?} {location} ({})",
            provider.name,
            core.cache_status(&session.settings.cache_root)
        )?;
    }

    if !core.file_sets.is_empty() {
        writeln!(out, "\nFile sets:")?;
        for fs in &core.file_sets {
            if fs.condition.is_always() {
                writeln!(out, "  {}", fs.name)?;
            } else {
                writeln!(out, "  {} [{}]", fs.name, fs.condition)?;
            }
            for file in &fs.files {
                let kind = file.file_type.as_deref().unwrap_or("");
                let include = if file.is_include_file { " (include)" } else { "" };
                writeln!(out, "    {} {kind}{include}", file.path.display())?;
            }
        }
    }

    if !core.parameters.is_empty() {
        writeln!(out, "\nParameters:")?;
        for (name, param) in &core.parameters {
            let default = param
                .default
                .as_ref()
                .map(|d| format!(" = {d}"))
                .unwrap_or_default();
            let description = param.description.as_deref().unwrap_or("");
            writeln!(out, "  {name} : {}{default}  {description}", param.datatype.as_str())?;
        }
    }

    if !core.targets.is_empty() {
        writeln!(out, "\nTargets:")?;
        for (name, target) in &core.targets {
            let tool = target.default_tool.as_deref().unwrap_or("<none>");
            writeln!(out, "  {name} (default tool: {tool})")?;
            if let Some(toplevel) = &target.toplevel {
                writeln!(out, "    toplevel:     {toplevel}")?;
            }
            if !target.filesets.is_empty() {
                writeln!(out, "    file sets:    {}", target.filesets.join(", "))?;
            }
            for dep in &target.dependencies {
                if dep.condition.is_always() {
                    writeln!(out, "    depends on:   {}", dep.constraint)?;
                } else {
                    writeln!(out, "    depends on:   {} [{}]", dep.constraint, dep.condition)?;
                }
            }
        }
    }
    Ok(out)
}
