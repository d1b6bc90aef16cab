//! socforge CLI: build and package manager for reusable hardware IP cores.

mod commands;
mod session;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use socforge_backend::BackendRegistry;
use socforge_core::WordSize;

use commands::flow::{FlowRequest, Stages};
use session::{Globals, Session};

#[derive(Parser)]
#[command(name = "socforge", version, about = "Build and package manager for hardware IP cores")]
struct Cli {
    /// Add a directory to search for cores (repeatable; later wins)
    #[arg(long = "cores-root", global = true)]
    cores_root: Vec<PathBuf>,
    /// Force 32-bit mode for invoked tools
    #[arg(long = "32", global = true, conflicts_with = "bits64")]
    bits32: bool,
    /// Force 64-bit mode for invoked tools
    #[arg(long = "64", global = true)]
    bits64: bool,
    /// Don't color output
    #[arg(long, global = true)]
    monochrome: bool,
    /// More info messages
    #[arg(long, global = true)]
    verbose: bool,
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the search order for core root paths
    ListPaths,
    /// List available cores
    ListCores,
    /// List available systems
    ListSystems,
    /// Display details about a core
    CoreInfo {
        /// Core name
        core: String,
        /// Also show the resolved dependency tree
        #[arg(long)]
        deps: bool,
        /// Flow used to resolve dependencies
        #[arg(long, default_value = "sim")]
        flow: String,
    },
    /// Fetch a remote core into the cache
    Fetch {
        /// Core to fetch
        core: String,
    },
    /// Build an FPGA load module
    Build {
        /// System to build
        system: String,
        /// Override the default target
        #[arg(long)]
        target: Option<String>,
        /// Only create the project files, don't build
        #[arg(long)]
        setup: bool,
        /// Use the sources in place instead of exporting them
        #[arg(long)]
        no_export: bool,
        /// Set a use-flag (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Arguments passed to the backend
        #[arg(last = true)]
        backend_args: Vec<String>,
    },
    /// Program an FPGA with a system
    Pgm {
        /// System to program
        system: String,
        /// Arguments passed to the backend
        #[arg(last = true)]
        backend_args: Vec<String>,
    },
    /// Set up and run a simulation
    Sim {
        /// Core to simulate
        system: String,
        /// Override the default simulator
        #[arg(long = "sim")]
        tool: Option<String>,
        /// Override the default target
        #[arg(long)]
        target: Option<String>,
        /// Only create the project files, don't build or run
        #[arg(long)]
        setup: bool,
        /// Set up and build the simulation model, don't run it
        #[arg(long)]
        build_only: bool,
        /// Reuse an existing simulation model instead of rebuilding it
        #[arg(long)]
        keep: bool,
        /// Use the sources in place instead of exporting them
        #[arg(long)]
        no_export: bool,
        /// Set a use-flag (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Arguments passed to the backend
        #[arg(last = true)]
        backend_args: Vec<String>,
    },
    /// Run any tool on a system through the selected stages
    Run {
        /// Tool to use
        tool: String,
        /// System to run
        system: String,
        /// Flow to resolve the system for
        #[arg(long, default_value = "default")]
        flow: String,
        /// Override the flow's target
        #[arg(long)]
        target: Option<String>,
        /// Execute the setup stage
        #[arg(long)]
        setup: bool,
        /// Execute the build stage
        #[arg(long)]
        build: bool,
        /// Execute the run stage
        #[arg(long = "launch")]
        launch: bool,
        /// Use the sources in place instead of exporting them
        #[arg(long)]
        no_export: bool,
        /// Set a use-flag (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Arguments passed to the backend
        #[arg(last = true)]
        backend_args: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.monochrome);

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("socforge aborted");
        process::exit(1);
    }) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool, monochrome: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!monochrome)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn globals(cli: &Cli) -> Globals {
    let word_size = if cli.bits32 {
        Some(WordSize::Bits32)
    } else if cli.bits64 {
        Some(WordSize::Bits64)
    } else {
        None
    };
    Globals {
        cores_roots: cli.cores_root.clone(),
        word_size,
        config: cli.config.clone(),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session::open(&globals(&cli))?;
    let backends = BackendRegistry::with_defaults();

    match cli.command {
        Commands::ListPaths => commands::list::list_paths(&session),
        Commands::ListCores => commands::list::list_cores(&session),
        Commands::ListSystems => commands::list::list_systems(&session),
        Commands::CoreInfo { core, deps, flow } => commands::info::run(&session, &core, deps, &flow),
        Commands::Fetch { core } => commands::fetch::run(&session, &core),

        Commands::Build {
            system,
            target,
            setup,
            no_export,
            flags,
            backend_args,
        } => {
            let req = FlowRequest {
                target: target.as_deref(),
                flags: &flags,
                stages: Stages::select(true, !setup, false),
                export: !no_export,
                backend_args: &backend_args,
                ..FlowRequest::new(&system, "synth")
            };
            commands::flow::run(&session, &backends, &req).map(|_| ())
        }

        Commands::Pgm {
            system,
            backend_args,
        } => {
            let req = FlowRequest {
                stages: Stages::select(false, false, true),
                export: false,
                backend_args: &backend_args,
                ..FlowRequest::new(&system, "synth")
            };
            commands::flow::run(&session, &backends, &req).map(|_| ())
        }

        Commands::Sim {
            system,
            tool,
            target,
            setup,
            build_only,
            keep,
            no_export,
            flags,
            backend_args,
        } => {
            let stages = if setup {
                Stages::select(true, false, false)
            } else if build_only {
                Stages::select(true, true, false)
            } else {
                Stages::ALL
            };
            let req = FlowRequest {
                tool: tool.as_deref(),
                target: target.as_deref(),
                flags: &flags,
                stages,
                export: !no_export,
                keep,
                backend_args: &backend_args,
                ..FlowRequest::new(&system, "sim")
            };
            commands::flow::run(&session, &backends, &req).map(|_| ())
        }

        Commands::Run {
            tool,
            system,
            flow,
            target,
            setup,
            build,
            launch,
            no_export,
            flags,
            backend_args,
        } => {
            let req = FlowRequest {
                tool: Some(tool.as_str()),
                target: target.as_deref(),
                flags: &flags,
                stages: Stages::select(setup, build, launch),
                export: !no_export,
                backend_args: &backend_args,
                ..FlowRequest::new(&system, &flow)
            };
            commands::flow::run(&session, &backends, &req).map(|_| ())
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use socforge_core::config::MainSection;
    use socforge_core::{Config, CoreError};
    use std::path::Path;

    /// A cores library with a simulated design, its dependency, and a
    /// synthesizable system, plus a config pointing the build and cache
    /// roots into the same temporary directory.
    fn workspace() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let cores = dir.path().join("cores");
        std::fs::create_dir_all(cores.join("fifo")).unwrap();
        std::fs::create_dir_all(cores.join("uart")).unwrap();

        std::fs::write(
            cores.join("fifo/fifo.core"),
            r#"
name = "acme:ip:fifo:1.1"

[[filesets]]
name = "rtl"
file_type = "verilogSource"
files = ["fifo.v"]

[parameters.DEPTH]
datatype = "int"
paramtype = "vlogparam"
default = 16
"#,
        )
        .unwrap();
        std::fs::write(cores.join("fifo/fifo.v"), "module fifo; endmodule\n").unwrap();

        std::fs::write(
            cores.join("uart/uart.core"),
            r#"
name = "acme:ip:uart:1.0"

[[filesets]]
name = "rtl"
file_type = "verilogSource"
files = ["uart.v"]

[[filesets]]
name = "tb"
file_type = "verilogSource"
files = ["uart_tb.v"]

[targets.sim]
default_tool = "icarus"
toplevel = "uart_tb"
filesets = ["rtl", "tb"]
dependencies = ["acme:ip:fifo:>=1.0"]

[targets.sim.tool_options.icarus]
build_command = ["sh", "-c", "cat files.f > built.txt"]
run_command = ["sh", "-c", "echo ran \"$@\" > ran.txt", "sh"]

[targets.synth]
default_tool = "yosys"
toplevel = "uart"
filesets = ["rtl"]
dependencies = ["acme:ip:fifo:>=1.0"]
"#,
        )
        .unwrap();
        std::fs::write(cores.join("uart/uart.v"), "module uart; endmodule\n").unwrap();
        std::fs::write(cores.join("uart/uart_tb.v"), "module uart_tb; endmodule\n").unwrap();

        let config = Config {
            main: MainSection {
                cores_root: vec![cores],
                build_root: Some(dir.path().join("build")),
                cache_root: Some(dir.path().join("cache")),
                ..MainSection::default()
            },
        };
        let session = Session::from_parts(config, None, &Globals::default());
        (dir, session)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Full simulation: resolve, export, set up, build and run.
    #[test]
    fn sim_runs_all_stages() {
        let (dir, session) = workspace();
        let backend_args = args(&["+trace"]);
        let req = FlowRequest {
            backend_args: &backend_args,
            ..FlowRequest::new("uart", "sim")
        };
        let work_root = commands::flow::run(&session, &BackendRegistry::with_defaults(), &req).unwrap();

        let system_dir = dir.path().join("build/acme_ip_uart_1_0");
        assert_eq!(work_root, system_dir.join("sim-icarus"));
        assert!(work_root.join("acme_ip_uart_1_0.eda.json").is_file());
        assert!(system_dir.join("src/acme_ip_fifo_1_1/fifo.v").is_file());

        // Files come from the export tree, dependency first.
        let built = std::fs::read_to_string(work_root.join("built.txt")).unwrap();
        let lines: Vec<&str> = built.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("src/acme_ip_fifo_1_1/fifo.v"));
        assert!(lines[2].ends_with("src/acme_ip_uart_1_0/uart_tb.v"));

        let ran = std::fs::read_to_string(work_root.join("ran.txt")).unwrap();
        assert_eq!(ran, "ran +trace\n");
    }

    #[test]
    fn sim_setup_only_skips_build() {
        let (_dir, session) = workspace();
        let req = FlowRequest {
            stages: Stages::select(true, false, false),
            export: false,
            ..FlowRequest::new("uart", "sim")
        };
        let work_root = commands::flow::run(&session, &BackendRegistry::with_defaults(), &req).unwrap();
        assert!(work_root.join("files.f").is_file());
        assert!(!work_root.join("built.txt").exists());

        // Without export, file lists point into the cores library.
        let files = std::fs::read_to_string(work_root.join("files.f")).unwrap();
        assert!(files.contains("cores/fifo/fifo.v"));
    }

    #[test]
    fn keep_reuses_existing_work_root() {
        let (_dir, session) = workspace();
        let backends = BackendRegistry::with_defaults();
        let work_root = commands::flow::run(&session, &backends, &FlowRequest::new("uart", "sim")).unwrap();
        std::fs::remove_file(work_root.join("built.txt")).unwrap();

        let req = FlowRequest {
            keep: true,
            ..FlowRequest::new("uart", "sim")
        };
        commands::flow::run(&session, &backends, &req).unwrap();
        assert!(!work_root.join("built.txt").exists());
        assert!(work_root.join("ran.txt").is_file());
    }

    #[test]
    fn build_uses_synth_flow_work_root() {
        let (dir, session) = workspace();
        let req = FlowRequest {
            stages: Stages::select(true, true, false),
            ..FlowRequest::new("uart", "synth")
        };
        let work_root = commands::flow::run(&session, &BackendRegistry::with_defaults(), &req).unwrap();
        assert_eq!(work_root, dir.path().join("build/acme_ip_uart_1_0/bld-yosys"));

        let eda = std::fs::read_to_string(work_root.join("acme_ip_uart_1_0.eda.json")).unwrap();
        assert!(eda.contains("\"toplevel\": \"uart\""));
        assert!(!eda.contains("uart_tb.v"));
    }

    #[test]
    fn pgm_without_run_command_fails() {
        let (_dir, session) = workspace();
        let req = FlowRequest {
            stages: Stages::select(false, false, true),
            export: false,
            ..FlowRequest::new("uart", "synth")
        };
        let err = commands::flow::run(&session, &BackendRegistry::with_defaults(), &req).unwrap_err();
        assert!(format!("{err:#}").contains("no run_command"));
    }

    #[test]
    fn unsupported_tool_is_reported() {
        let (_dir, session) = workspace();
        let req = FlowRequest {
            tool: Some("verilator"),
            ..FlowRequest::new("uart", "sim")
        };
        let err = commands::flow::run(&session, &BackendRegistry::with_defaults(), &req).unwrap_err();
        let core_err = err.downcast_ref::<CoreError>().unwrap();
        assert!(matches!(core_err, CoreError::UnsupportedTool { .. }));
    }

    #[test]
    fn missing_flow_is_reported() {
        let (_dir, session) = workspace();
        let err = commands::flow::run(
            &session,
            &BackendRegistry::with_defaults(),
            &FlowRequest::new("uart", "lint"),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("lint"));
    }

    #[test]
    fn cli_parses_flow_commands() {
        let cli = Cli::parse_from([
            "socforge",
            "--cores-root",
            "/a",
            "--cores-root",
            "/b",
            "--32",
            "sim",
            "uart",
            "--sim",
            "icarus",
            "--flag",
            "debug",
            "--",
            "--DEPTH=4",
        ]);
        let globals = globals(&cli);
        assert_eq!(globals.cores_roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(globals.word_size, Some(WordSize::Bits32));
        match cli.command {
            Commands::Sim {
                system,
                tool,
                flags,
                backend_args,
                ..
            } => {
                assert_eq!(system, "uart");
                assert_eq!(tool.as_deref(), Some("icarus"));
                assert_eq!(flags, vec!["debug"]);
                assert_eq!(backend_args, vec!["--DEPTH=4"]);
            }
            _ => panic!("expected sim"),
        }
    }

    #[test]
    fn cli_rejects_both_word_sizes() {
        assert!(Cli::try_parse_from(["socforge", "--32", "--64", "list-cores"]).is_err());
    }

    #[test]
    fn run_command_parses_stages() {
        let cli = Cli::parse_from(["socforge", "run", "icarus", "uart", "--build"]);
        match cli.command {
            Commands::Run {
                tool, build, setup, launch, flow, ..
            } => {
                assert_eq!(tool, "icarus");
                assert_eq!(flow, "default");
                assert_eq!(Stages::select(setup, build, launch), Stages {
                    setup: false,
                    build: true,
                    run: false
                });
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn env_roots_take_precedence_over_config() {
        let (dir, _) = workspace();
        let other = dir.path().join("other");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("fifo.core"), "name = \"acme:ip:fifo:1.1\"\n").unwrap();

        let config = Config {
            main: MainSection {
                cores_root: vec![dir.path().join("cores")],
                ..MainSection::default()
            },
        };
        let env = other.display().to_string();
        let session = Session::from_parts(config, Some(&env), &Globals::default());
        let fifo = session.core("fifo").unwrap();
        assert_eq!(fifo.core_root, Path::new(&other));
    }
}
