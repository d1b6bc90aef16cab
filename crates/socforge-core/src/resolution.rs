//! Dependency resolution.
//!
//! Walks the dependency graph depth-first from a root core and returns the
//! closure in dependency-first (post-order) build order: a core never
//! precedes anything it depends on.
//!
//! Each core name resolves to exactly one concrete descriptor per closure.
//! A later constraint that admits the already chosen version reuses it;
//! one that does not is a version conflict. Nothing is ever picked
//! silently.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::core_file::{CoreDescriptor, FileSet, Parameter, Target};
use crate::error::{CoreError, Result};
use crate::flags::Flags;
use crate::registry::CoreRegistry;
use crate::vlnv::{Constraint, Vlnv};

/// Target entry used by dependencies that lack one for the requested flow.
pub const DEFAULT_TARGET: &str = "default";

/// What to resolve for: a flow, an optional explicit target of the root
/// core, and the active use-flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub flow: String,
    pub target: Option<String>,
    pub flags: Flags,
}

impl Selection {
    pub fn new(flow: &str) -> Self {
        Selection {
            flow: flow.to_string(),
            target: None,
            flags: Flags::new(),
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Target name used for the root core.
    pub fn root_target(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.flow)
    }
}

/// One core of a resolved closure.
#[derive(Debug, Clone)]
pub struct ResolvedCore {
    pub core: Arc<CoreDescriptor>,
    /// Name of the selected target entry; `None` for dependency-only leaves.
    pub target_name: Option<String>,
    /// Direct dependencies active under the selection, in declaration order.
    pub dependencies: Vec<Vlnv>,
}

impl ResolvedCore {
    pub fn identity(&self) -> &Vlnv {
        &self.core.identity
    }

    pub fn target(&self) -> Option<&Target> {
        self.target_name
            .as_deref()
            .and_then(|name| self.core.targets.get(name))
    }

    /// File sets contributed under `flags`.
    ///
    /// A selected target fully determines the file sets; a leaf contributes
    /// all of its file sets.
    pub fn active_file_sets(&self, flags: &Flags) -> Vec<&FileSet> {
        let candidates: Vec<&FileSet> = match self.target() {
            Some(target) => target
                .filesets
                .iter()
                .filter_map(|name| self.core.file_set(name))
                .collect(),
            None => self.core.file_sets.iter().collect(),
        };
        candidates
            .into_iter()
            .filter(|fs| fs.condition.satisfied_by(flags))
            .collect()
    }

    /// Parameters exposed by the selected target, in name order.
    pub fn exposed_parameters(&self) -> Vec<(&str, &Parameter)> {
        match self.target().and_then(|t| t.parameters.as_ref()) {
            Some(names) => {
                let mut exposed: Vec<(&str, &Parameter)> = names
                    .iter()
                    .filter_map(|n| self.core.parameters.get_key_value(n))
                    .map(|(n, p)| (n.as_str(), p))
                    .collect();
                exposed.sort_by(|a, b| a.0.cmp(b.0));
                exposed.dedup_by(|a, b| a.0 == b.0);
                exposed
            }
            None => self
                .core
                .parameters
                .iter()
                .map(|(n, p)| (n.as_str(), p))
                .collect(),
        }
    }
}

/// The dependency-ordered set of cores required to realize a root core.
#[derive(Debug, Clone)]
pub struct ResolvedClosure {
    pub root: Vlnv,
    pub selection: Selection,
    /// Dependency-first order; the root core is last.
    pub cores: Vec<ResolvedCore>,
}

impl ResolvedClosure {
    /// The root core's entry.
    pub fn root_core(&self) -> &ResolvedCore {
        self.cores
            .last()
            .expect("a resolved closure always contains its root")
    }

    pub fn get(&self, identity: &Vlnv) -> Option<&ResolvedCore> {
        self.cores.iter().find(|c| c.identity() == identity)
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

/// A constraint together with where it came from.
#[derive(Debug, Clone)]
struct Requirement {
    constraint: Constraint,
    required_by: Vlnv,
    /// Cores on the traversal stack when the constraint was met, root first.
    chain: Vec<Vlnv>,
    /// Encounter order, for stable conflict reports.
    seq: usize,
}

#[derive(Debug, Clone)]
struct Choice {
    core: Arc<CoreDescriptor>,
    requirement: Requirement,
}

/// Resolve the closure of `root` under `selection`.
pub fn resolve(
    registry: &CoreRegistry,
    root: &Vlnv,
    selection: &Selection,
) -> Result<ResolvedClosure> {
    let root_core = registry.lookup(root)?;
    debug!(root = %root_core.identity, flow = %selection.flow, "resolving dependencies");

    let mut walk = Walk {
        registry,
        selection,
        stack: Vec::new(),
        done: HashSet::new(),
        order: Vec::new(),
        choices: Vec::new(),
        deferred: Vec::new(),
        seq: 0,
    };

    let root_requirement = walk.requirement(Constraint::from(root_core.identity.clone()), &root_core.identity);
    walk.choices.push(Choice {
        core: Arc::clone(&root_core),
        requirement: root_requirement,
    });
    walk.visit(root_core, true)?;
    walk.check_deferred()?;

    debug!(cores = walk.order.len(), "resolved closure");
    Ok(ResolvedClosure {
        root: walk
            .order
            .last()
            .map(|c| c.core.identity.clone())
            .unwrap_or_else(|| root.clone()),
        selection: selection.clone(),
        cores: walk.order,
    })
}

struct Walk<'a> {
    registry: &'a CoreRegistry,
    selection: &'a Selection,
    stack: Vec<Vlnv>,
    done: HashSet<Vlnv>,
    order: Vec<ResolvedCore>,
    /// The concrete core chosen for each core name so far.
    choices: Vec<Choice>,
    /// Constraints on known cores that no registered version satisfies.
    deferred: Vec<Requirement>,
    seq: usize,
}

impl Walk<'_> {
    fn visit(&mut self, core: Arc<CoreDescriptor>, is_root: bool) -> Result<()> {
        let identity = core.identity.clone();
        self.stack.push(identity.clone());

        let target_name = self.select_target(&core, is_root)?;
        let decls = target_name
            .as_deref()
            .and_then(|name| core.targets.get(name))
            .map(|t| t.dependencies.clone())
            .unwrap_or_default();

        let mut dependencies = Vec::new();
        for decl in decls {
            if !decl.condition.satisfied_by(&self.selection.flags) {
                debug!(core = %identity, dependency = %decl.constraint, "edge disabled by use-flags");
                continue;
            }

            let Some(dep) = self.resolve_edge(&decl.constraint, &identity)? else {
                continue;
            };

            if let Some(pos) = self.stack.iter().position(|id| *id == dep.identity) {
                let mut cycle: Vec<String> = self.stack[pos..].iter().map(Vlnv::to_string).collect();
                cycle.push(dep.identity.to_string());
                return Err(CoreError::CyclicDependency { cycle });
            }

            if !dependencies.contains(&dep.identity) {
                dependencies.push(dep.identity.clone());
            }
            if !self.done.contains(&dep.identity) {
                self.visit(dep, false)?;
            }
        }

        self.stack.pop();
        self.done.insert(identity.clone());
        self.order.push(ResolvedCore {
            core,
            target_name,
            dependencies,
        });
        Ok(())
    }

    fn select_target(&self, core: &CoreDescriptor, is_root: bool) -> Result<Option<String>> {
        if core.is_leaf() {
            return Ok(None);
        }
        let wanted = if is_root {
            self.selection.root_target()
        } else {
            self.selection.flow.as_str()
        };
        if core.targets.contains_key(wanted) {
            return Ok(Some(wanted.to_string()));
        }
        if !is_root && core.targets.contains_key(DEFAULT_TARGET) {
            return Ok(Some(DEFAULT_TARGET.to_string()));
        }
        Err(CoreError::FlowNotSupported {
            core: core.identity.to_string(),
            flow: wanted.to_string(),
        })
    }

    /// Map one constraint to a concrete core, or defer it when only the
    /// version is unsatisfiable.
    fn resolve_edge(
        &mut self,
        constraint: &Constraint,
        required_by: &Vlnv,
    ) -> Result<Option<Arc<CoreDescriptor>>> {
        let requirement = self.requirement(constraint.clone(), required_by);

        let related: Vec<&Choice> = self
            .choices
            .iter()
            .filter(|c| constraint.query().matches(&c.core.identity))
            .collect();
        if !related.is_empty() {
            if let Some(choice) = related.iter().find(|c| constraint.admits(&c.core.identity)) {
                return Ok(Some(Arc::clone(&choice.core)));
            }
            return Err(conflict(&related[0].requirement, &requirement));
        }

        match self.registry.lookup_constraint(constraint) {
            Some(core) => {
                debug!(constraint = %constraint, resolved = %core.identity, "resolved dependency");
                self.choices.push(Choice {
                    core: Arc::clone(&core),
                    requirement,
                });
                Ok(Some(core))
            }
            None if self.registry.knows(constraint) => {
                debug!(constraint = %constraint, "no registered version satisfies; deferring");
                self.deferred.push(requirement);
                Ok(None)
            }
            None => Err(CoreError::Dependency {
                required: constraint.to_string(),
                chain: requirement.chain.iter().map(Vlnv::to_string).collect(),
            }),
        }
    }

    /// Turn deferred constraints into conflicts or missing-dependency errors.
    fn check_deferred(&self) -> Result<()> {
        let Some(unmet) = self.deferred.first() else {
            return Ok(());
        };
        let other = self
            .choices
            .iter()
            .find(|c| unmet.constraint.query().matches(&c.core.identity));
        match other {
            Some(choice) => Err(conflict(&choice.requirement, unmet)),
            None => Err(CoreError::Dependency {
                required: unmet.constraint.to_string(),
                chain: unmet.chain.iter().map(Vlnv::to_string).collect(),
            }),
        }
    }

    fn requirement(&mut self, constraint: Constraint, required_by: &Vlnv) -> Requirement {
        self.seq += 1;
        Requirement {
            constraint,
            required_by: required_by.clone(),
            chain: self.stack.clone(),
            seq: self.seq,
        }
    }
}

/// Build a version conflict, listing the earlier requirement first.
fn conflict(a: &Requirement, b: &Requirement) -> CoreError {
    let (first, second) = if a.seq <= b.seq { (a, b) } else { (b, a) };
    CoreError::VersionConflict {
        core: first.constraint.query().to_string(),
        first: first.constraint.to_string(),
        first_by: first.required_by.to_string(),
        second: second.constraint.to_string(),
        second_by: second.required_by.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Write a core file with a `sim` target and the given dependencies.
    fn add_core(dir: &Path, name: &str, deps: &[&str]) {
        let deps_toml: Vec<String> = deps.iter().map(|d| format!("\"{d}\"")).collect();
        let body = format!(
            "name = \"{name}\"\n\n[targets.sim]\ndefault_tool = \"icarus\"\ndependencies = [{}]\n",
            deps_toml.join(", ")
        );
        write(dir, name, &body);
    }

    fn write(dir: &Path, name: &str, body: &str) {
        let file = dir.join(format!("{}.core", Vlnv::parse(name).unwrap().sanitized_name()));
        std::fs::write(file, body).unwrap();
    }

    fn registry(dir: &Path) -> CoreRegistry {
        let mut registry = CoreRegistry::new();
        registry.add_root(dir).unwrap();
        registry
    }

    fn id(s: &str) -> Vlnv {
        Vlnv::parse(s).unwrap()
    }

    fn names(closure: &ResolvedClosure) -> Vec<String> {
        closure.cores.iter().map(|c| c.identity().to_string()).collect()
    }

    #[test]
    fn single_core_without_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::solo:1.0", &[]);
        let closure = resolve(&registry(dir.path()), &id("solo"), &Selection::new("sim")).unwrap();
        assert_eq!(names(&closure), vec!["::solo:1.0"]);
        assert_eq!(closure.root, id("::solo:1.0"));
    }

    #[test]
    fn dependency_first_order() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["::mid:1.0", "::leaf:1.0"]);
        add_core(dir.path(), "::mid:1.0", &["::leaf:1.0"]);
        add_core(dir.path(), "::leaf:1.0", &[]);

        let closure = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(names(&closure), vec!["::leaf:1.0", "::mid:1.0", "::top:1.0"]);
        assert_eq!(
            closure.root_core().dependencies,
            vec![id("::mid:1.0"), id("::leaf:1.0")]
        );
    }

    #[test]
    fn diamond_resolves_to_one_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["::left:1.0", "::right:1.0"]);
        add_core(dir.path(), "::left:1.0", &["shared>=1.0"]);
        add_core(dir.path(), "::right:1.0", &["shared"]);
        add_core(dir.path(), "::shared:1.2", &[]);

        let closure = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(
            names(&closure),
            vec!["::shared:1.2", "::left:1.0", "::right:1.0", "::top:1.0"]
        );
    }

    #[test]
    fn mutual_dependency_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::a:1.0", &["b"]);
        add_core(dir.path(), "::b:1.0", &["a"]);

        let err = resolve(&registry(dir.path()), &id("a"), &Selection::new("sim")).unwrap_err();
        match err {
            CoreError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["::a:1.0", "::b:1.0", "::a:1.0"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::me:1.0", &["me"]);
        let err = resolve(&registry(dir.path()), &id("me"), &Selection::new("sim")).unwrap_err();
        assert!(matches!(err, CoreError::CyclicDependency { .. }));
    }

    #[test]
    fn unsatisfiable_version_against_transitive_requirement() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["x>=2.0", "::b:1.0"]);
        add_core(dir.path(), "::b:1.0", &["x==1.0"]);
        add_core(dir.path(), "::x:1.0", &[]);

        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap_err();
        match err {
            CoreError::VersionConflict {
                core,
                first,
                first_by,
                second,
                second_by,
            } => {
                assert_eq!(core, "x");
                assert_eq!(first, "x>=2.0");
                assert_eq!(first_by, "::top:1.0");
                assert_eq!(second, "x==1.0");
                assert_eq!(second_by, "::b:1.0");
            }
            other => panic!("expected version conflict, got {other}"),
        }
    }

    #[test]
    fn diverging_choices_conflict() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["x>=1.0", "::b:1.0"]);
        add_core(dir.path(), "::b:1.0", &["x==1.0"]);
        add_core(dir.path(), "::x:1.0", &[]);
        add_core(dir.path(), "::x:2.0", &[]);

        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap_err();
        assert!(matches!(err, CoreError::VersionConflict { .. }));
    }

    #[test]
    fn unknown_version_without_other_requirement_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["x>=2.0"]);
        add_core(dir.path(), "::x:1.0", &[]);

        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap_err();
        assert!(matches!(err, CoreError::Dependency { ref required, .. } if required == "x>=2.0"));
    }

    #[test]
    fn missing_dependency_names_constraint_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["::mid:1.0"]);
        add_core(dir.path(), "::mid:1.0", &["acme:ip:ghost:3.1"]);

        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap_err();
        match err {
            CoreError::Dependency { required, chain } => {
                assert_eq!(required, "acme:ip:ghost:==3.1");
                assert_eq!(chain, vec!["::top:1.0", "::mid:1.0"]);
            }
            other => panic!("expected dependency error, got {other}"),
        }
    }

    #[test]
    fn conditional_edge_removed_when_flag_unset() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "::top:1.0",
            r#"
name = "::top:1.0"
[targets.sim]
dependencies = [{ core = "::probe:1.0", use_flags = ["debug"] }]
"#,
        );
        add_core(dir.path(), "::probe:1.0", &[]);
        let registry = registry(dir.path());

        let plain = resolve(&registry, &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(names(&plain), vec!["::top:1.0"]);

        let debug = Selection::new("sim").with_flags(Flags::new().with("debug"));
        let flagged = resolve(&registry, &id("top"), &debug).unwrap();
        assert_eq!(names(&flagged), vec!["::probe:1.0", "::top:1.0"]);
    }

    #[test]
    fn conditional_edge_to_missing_core_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "::top:1.0",
            r#"
name = "::top:1.0"
[targets.sim]
dependencies = [{ core = "::absent", use_flags = ["never"] }]
"#,
        );
        assert!(resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).is_ok());
    }

    #[test]
    fn flow_not_supported() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &[]);
        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("synth")).unwrap_err();
        assert!(matches!(err, CoreError::FlowNotSupported { ref flow, .. } if flow == "synth"));
    }

    #[test]
    fn dependency_without_flow_or_default_target() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["::mid:1.0"]);
        add_core(dir.path(), "::mid:1.0", &["lib"]);
        write(
            dir.path(),
            "::lib:1.0",
            "name = \"::lib:1.0\"\n[targets.synth]\ndefault_tool = \"vivado\"\n",
        );
        let err = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap_err();
        match err {
            CoreError::FlowNotSupported { core, flow } => {
                assert_eq!(core, "::lib:1.0");
                assert_eq!(flow, "sim");
            }
            other => panic!("expected unsupported flow, got {other}"),
        }
    }

    #[test]
    fn negated_edge_removed_when_flag_set() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "::top:1.0",
            r#"
name = "::top:1.0"
[targets.sim]
dependencies = [{ core = "::model:1.0", use_flags = ["!fpga"] }]
"#,
        );
        add_core(dir.path(), "::model:1.0", &[]);
        let registry = registry(dir.path());

        let plain = resolve(&registry, &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(names(&plain), vec!["::model:1.0", "::top:1.0"]);

        let fpga = Selection::new("sim").with_flags(Flags::new().with("fpga"));
        let flagged = resolve(&registry, &id("top"), &fpga).unwrap();
        assert_eq!(names(&flagged), vec!["::top:1.0"]);
        assert!(flagged.root_core().dependencies.is_empty());
    }

    #[test]
    fn dependencies_fall_back_to_default_target() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["lib"]);
        write(
            dir.path(),
            "::lib:1.0",
            "name = \"::lib:1.0\"\n[targets.default]\n",
        );
        let closure = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(closure.cores[0].target_name.as_deref(), Some(DEFAULT_TARGET));
    }

    #[test]
    fn leaf_cores_contribute_without_targets() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["lib"]);
        write(dir.path(), "::lib:1.0", "name = \"::lib:1.0\"\n");
        let closure = resolve(&registry(dir.path()), &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(closure.cores[0].target_name, None);
    }

    #[test]
    fn explicit_root_target() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "::top:1.0",
            r#"
name = "::top:1.0"
[targets.sim]
[targets.lint]
dependencies = ["lib"]
"#,
        );
        add_core(dir.path(), "::lib:1.0", &[]);
        let registry = registry(dir.path());

        let closure = resolve(&registry, &id("top"), &Selection::new("sim").with_target("lint")).unwrap();
        assert_eq!(closure.root_core().target_name.as_deref(), Some("lint"));
        assert_eq!(closure.len(), 2);
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        add_core(dir.path(), "::top:1.0", &["a", "b"]);
        add_core(dir.path(), "::a:1.0", &["c"]);
        add_core(dir.path(), "::b:1.0", &["c"]);
        add_core(dir.path(), "::c:1.0", &[]);
        let registry = registry(dir.path());

        let first = resolve(&registry, &id("top"), &Selection::new("sim")).unwrap();
        let second = resolve(&registry, &id("top"), &Selection::new("sim")).unwrap();
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn root_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&registry(dir.path()), &id("nothing"), &Selection::new("sim")).unwrap_err();
        assert!(matches!(err, CoreError::CoreNotFound { .. }));
    }
}
