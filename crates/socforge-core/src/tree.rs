//! Dependency tree display.
//!
//! Formats a resolved closure as an ASCII tree rooted at the requested core:
//! ```text
//! acme:soc:top:1.0
//! ├── acme:ip:uart:1.2
//! │   └── acme:ip:fifo:1.1
//! └── acme:ip:spi:0.3
//!     └── acme:ip:fifo:1.1 (shared)
//! ```

use std::collections::HashSet;

use crate::resolution::ResolvedClosure;
use crate::vlnv::Vlnv;

/// Format the closure's dependency tree.
pub fn format_closure(closure: &ResolvedClosure) -> String {
    let mut out = format!("{}\n", closure.root);
    let mut seen = HashSet::new();
    seen.insert(closure.root.clone());

    let children = &closure.root_core().dependencies;
    for (i, child) in children.iter().enumerate() {
        format_dep(&mut out, closure, child, "", i == children.len() - 1, &mut seen);
    }

    out.push_str(&format!("\n{} cores in closure\n", closure.len()));
    out
}

fn format_dep(
    out: &mut String,
    closure: &ResolvedClosure,
    identity: &Vlnv,
    prefix: &str,
    is_last: bool,
    seen: &mut HashSet<Vlnv>,
) {
    let connector = if is_last { "└── " } else { "├── " };
    let first_visit = seen.insert(identity.clone());
    let shared_marker = if first_visit { "" } else { " (shared)" };
    out.push_str(&format!("{prefix}{connector}{identity}{shared_marker}\n"));
    if !first_visit {
        return;
    }

    let child_prefix = if is_last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };
    let Some(entry) = closure.get(identity) else {
        return;
    };
    let count = entry.dependencies.len();
    for (i, child) in entry.dependencies.iter().enumerate() {
        format_dep(out, closure, child, &child_prefix, i == count - 1, seen);
    }
}
