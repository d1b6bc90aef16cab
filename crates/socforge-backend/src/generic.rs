//! Descriptor-driven backend for tools without a dedicated adapter.
//!
//! `configure` writes the work root:
//!
//! ```text
//! <work_root>/
//!   <sanitized name>.eda.json   serialized build descriptor
//!   files.f                     one source path per line
//!   .fingerprint                hash of the descriptor file last written
//! ```
//!
//! `build` and `run` launch the argv arrays found under `build_command`
//! and `run_command` in the merged tool options.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use socforge_core::{BuildDescriptor, ContentHash};

use crate::backend::{Backend, BackendContext, GENERIC_BACKEND};
use crate::error::{BackendError, Result};
use crate::launcher::Launcher;

/// Name of the file list written into the work root.
pub const FILE_LIST: &str = "files.f";

const FINGERPRINT_FILE: &str = ".fingerprint";

/// The backend used when a tool has no adapter of its own.
#[derive(Debug)]
pub struct GenericBackend {
    ctx: BackendContext,
    /// Parameter values given on the configure command line.
    overrides: BTreeMap<String, String>,
}

/// The document written to `<name>.eda.json`.
#[derive(Serialize)]
struct EdaFile<'a> {
    #[serde(flatten)]
    descriptor: &'a BuildDescriptor,
    /// Fingerprint of the descriptor alone, without command-line values.
    descriptor_fingerprint: String,
    word_size: u32,
    parameter_values: &'a BTreeMap<String, String>,
}

impl GenericBackend {
    pub fn new(ctx: BackendContext) -> Self {
        GenericBackend {
            ctx,
            overrides: BTreeMap::new(),
        }
    }

    /// Path of the serialized descriptor.
    pub fn eda_file(&self) -> PathBuf {
        self.ctx
            .work_root
            .join(format!("{}.eda.json", self.ctx.descriptor.name.sanitized_name()))
    }

    fn tool(&self) -> &str {
        &self.ctx.descriptor.tool
    }

    /// Parse `--NAME=value` and `--NAME value` overrides of descriptor parameters.
    ///
    /// Arguments not starting with `--` are meant for the run stage and are skipped.
    fn parse_overrides(&self, args: &[String]) -> Result<BTreeMap<String, String>> {
        let mut overrides = BTreeMap::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(body) = arg.strip_prefix("--") else {
                continue;
            };
            let (name, value) = match body.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => {
                    let value = iter
                        .next()
                        .ok_or_else(|| self.configure_error(format!("missing value for '--{body}'")))?;
                    (body.to_string(), value.clone())
                }
            };
            if !self.ctx.descriptor.parameters.contains_key(&name) {
                return Err(self.configure_error(format!("unknown parameter '{name}'")));
            }
            overrides.insert(name, value);
        }
        Ok(overrides)
    }

    fn configure_error(&self, message: String) -> BackendError {
        BackendError::Configure {
            tool: self.tool().to_string(),
            work_root: self.ctx.work_root.clone(),
            message,
        }
    }

    /// The argv stored under `key` in the tool options, if any.
    fn command(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.ctx.descriptor.tool_options.get(key) else {
            return Ok(None);
        };
        let argv = value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .filter(|argv| !argv.is_empty());
        match argv {
            Some(argv) => Ok(Some(argv)),
            None => Err(self.configure_error(format!("'{key}' must be a non-empty array of strings"))),
        }
    }

    fn launch(&self, argv: &[String], extra: &[String]) -> Result<()> {
        let Some(launcher) = Launcher::from_argv(argv) else {
            return Ok(());
        };
        let output = launcher
            .args(extra)
            .cwd(&self.ctx.work_root)
            .env("SOCFORGE_WORD_SIZE", &self.ctx.settings.word_size.bits().to_string())
            .env("SOCFORGE_TOPLEVEL", self.ctx.descriptor.toplevel.as_deref().unwrap_or(""))
            .run()?;
        for line in output.stdout.lines() {
            info!(target: "socforge::tool", "{line}");
        }
        Ok(())
    }
}

impl Backend for GenericBackend {
    fn name(&self) -> &str {
        GENERIC_BACKEND
    }

    fn configure(&mut self, args: &[String]) -> Result<()> {
        self.overrides = self.parse_overrides(args)?;
        let work_root = &self.ctx.work_root;
        std::fs::create_dir_all(work_root)?;

        let eda = EdaFile {
            descriptor: &self.ctx.descriptor,
            descriptor_fingerprint: self.ctx.descriptor.fingerprint()?.to_string(),
            word_size: self.ctx.settings.word_size.bits(),
            parameter_values: &self.overrides,
        };
        let eda_json = serde_json::to_string_pretty(&eda)?;
        let fingerprint = ContentHash::compute(eda_json.as_bytes());
        let stamp = work_root.join(FINGERPRINT_FILE);
        let unchanged = self.eda_file().is_file()
            && std::fs::read_to_string(&stamp).is_ok_and(|s| s.trim() == fingerprint.as_str());
        if unchanged {
            debug!(work_root = %work_root.display(), "configuration unchanged; keeping work root");
            return Ok(());
        }
        std::fs::write(self.eda_file(), eda_json)?;

        let file_list: String = self
            .ctx
            .descriptor
            .files
            .iter()
            .filter(|f| !f.is_include_file)
            .map(|f| format!("{}\n", f.full_path().display()))
            .collect();
        std::fs::write(work_root.join(FILE_LIST), file_list)?;
        std::fs::write(&stamp, format!("{fingerprint}\n"))?;

        debug!(
            work_root = %work_root.display(),
            fingerprint = %fingerprint.short(),
            "configured work root"
        );
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let Some(argv) = self.command("build_command")? else {
            debug!(tool = %self.tool(), "no build_command; nothing to build");
            return Ok(());
        };
        self.launch(&argv, &[]).map_err(|e| BackendError::Build {
            tool: self.tool().to_string(),
            message: e.to_string(),
        })
    }

    fn run(&mut self, args: &[String]) -> Result<()> {
        let argv = self.command("run_command")?.ok_or_else(|| BackendError::Run {
            tool: self.tool().to_string(),
            message: "no run_command in tool options".to_string(),
        })?;
        self.launch(&argv, args).map_err(|e| BackendError::Run {
            tool: self.tool().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support::context;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn configure_writes_descriptor_and_file_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&[]).unwrap();

        let work_root = dir.path().join("build");
        let eda = std::fs::read_to_string(work_root.join("acme_ip_blinky_1_0.eda.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&eda).unwrap();
        assert_eq!(json["tool"], "icarus");
        assert_eq!(json["toplevel"], "blinky");
        assert!(json["word_size"].is_u64());
        assert_eq!(json["descriptor_fingerprint"].as_str().map(str::len), Some(64));

        let files = std::fs::read_to_string(work_root.join(FILE_LIST)).unwrap();
        assert_eq!(files.trim(), dir.path().join("blinky.v").display().to_string());
        assert!(work_root.join(FINGERPRINT_FILE).is_file());
    }

    #[test]
    fn configure_accepts_parameter_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&args(&["--WIDTH=16"])).unwrap();
        let eda = std::fs::read_to_string(backend.eda_file()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&eda).unwrap();
        assert_eq!(json["parameter_values"]["WIDTH"], "16");

        backend.configure(&args(&["--WIDTH", "4"])).unwrap();
        let eda = std::fs::read_to_string(backend.eda_file()).unwrap();
        assert!(eda.contains("\"WIDTH\": \"4\""));
    }

    #[test]
    fn reconfigure_drops_stale_overrides() {
        let dir = tempfile::tempdir().unwrap();
        GenericBackend::new(context(dir.path(), ""))
            .configure(&args(&["--WIDTH=16"]))
            .unwrap();

        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&[]).unwrap();
        let eda = std::fs::read_to_string(backend.eda_file()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&eda).unwrap();
        assert!(json["parameter_values"].as_object().unwrap().is_empty());
    }

    #[test]
    fn unchanged_configuration_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&[]).unwrap();
        let file_list = dir.path().join("build").join(FILE_LIST);
        std::fs::write(&file_list, "edited\n").unwrap();

        backend.configure(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(&file_list).unwrap(), "edited\n");
    }

    #[test]
    fn configure_skips_run_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&args(&["+trace", "--WIDTH=2"])).unwrap();
        assert_eq!(backend.overrides.get("WIDTH").map(String::as_str), Some("2"));
    }

    #[test]
    fn configure_rejects_unknown_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        let err = backend.configure(&args(&["--DEPTH=2"])).unwrap_err();
        assert!(matches!(err, BackendError::Configure { .. }));
        assert!(err.to_string().contains("unknown parameter 'DEPTH'"));
    }

    #[test]
    fn build_without_command_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&[]).unwrap();
        backend.build().unwrap();
    }

    #[test]
    fn build_and_run_launch_commands_in_work_root() {
        let dir = tempfile::tempdir().unwrap();
        let options = r#"
build_command = ["sh", "-c", "echo built > build.log"]
run_command = ["sh", "-c", "echo $SOCFORGE_TOPLEVEL \"$@\" > run.log", "sh"]
"#;
        let mut backend = GenericBackend::new(context(dir.path(), options));
        backend.configure(&[]).unwrap();
        backend.build().unwrap();
        backend.run(&args(&["+seed=1"])).unwrap();

        let work_root = dir.path().join("build");
        assert_eq!(std::fs::read_to_string(work_root.join("build.log")).unwrap(), "built\n");
        assert_eq!(
            std::fs::read_to_string(work_root.join("run.log")).unwrap(),
            "blinky +seed=1\n"
        );
    }

    #[test]
    fn failing_build_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), r#"build_command = ["false"]"#));
        backend.configure(&[]).unwrap();
        let err = backend.build().unwrap_err();
        assert!(matches!(err, BackendError::Build { ref tool, .. } if tool == "icarus"));
    }

    #[test]
    fn run_without_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), ""));
        backend.configure(&[]).unwrap();
        assert!(matches!(backend.run(&[]).unwrap_err(), BackendError::Run { .. }));
    }

    #[test]
    fn malformed_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GenericBackend::new(context(dir.path(), r#"build_command = "make""#));
        backend.configure(&[]).unwrap();
        assert!(backend.build().is_err());
    }
}
