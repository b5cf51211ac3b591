use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ipax_core::{Container, HeadlessAnalyzer, ReportListener};
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled, settings::Style};

/// Fat Mach-O slicing and decompiler hand-off
#[derive(Parser)]
#[command(
    name = "ipax",
    about = "List, extract, and decompile architecture slices of fat Mach-O binaries",
    version,
    author
)]
struct Cli {
    /// Path to the Mach-O executable
    #[arg(required = true)]
    path: PathBuf,

    /// Display name for the executable (defaults to its file name)
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the architectures of a fat binary
    Archs,
    /// Replace a fat binary with one of its slices
    Extract {
        /// Architecture string exactly as printed by `archs`
        #[arg(long)]
        arch: String,
        /// Directory the slice is staged in before replacing the binary
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Thin the binary if needed, then run Ghidra headless and collect its report
    Decompile {
        /// Architecture to keep when the binary is fat
        #[arg(long)]
        arch: Option<String>,
        /// Ghidra installation directory
        #[arg(long, env = "GHIDRA_INSTALL_DIR")]
        ghidra_home: PathBuf,
        /// Directory holding the post-analysis script
        #[arg(long)]
        script_dir: Option<PathBuf>,
        /// Post-analysis script name
        #[arg(long, default_value = ipax_core::DEFAULT_SCRIPT)]
        script: String,
        /// Directory for the temporary Ghidra project
        #[arg(long)]
        project_dir: Option<PathBuf>,
        /// Directory for the staged slice and the JSON report
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Tabled)]
struct ArchRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Architecture")]
    arch: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "Size")]
    size: u64,
}

fn open(path: &Path, name: Option<String>) -> Result<Container> {
    let container = match name {
        Some(name) => Container::open_named(path, name),
        None => Container::open(path),
    };
    container.with_context(|| format!("failed to load {}", path.display()))
}

fn print_archs(container: &Container) {
    if !container.is_multi_arch() {
        println!("{} is not a fat binary.", container.path.display());
        return;
    }

    let rows: Vec<ArchRow> = container
        .slices()
        .iter()
        .enumerate()
        .map(|(index, s)| ArchRow {
            index,
            arch: s.display_string(),
            offset: format!("0x{:x}", s.offset),
            size: s.size,
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::modern()));
}

fn thin(container: Container, arch: &str, out_dir: &Path) -> Result<Container> {
    let thin = container
        .replace_with_slice(arch, out_dir)
        .with_context(|| format!("failed to extract '{arch}'"))?;
    println!(
        "{} {} now holds only {}",
        "Replaced:".green().bold(),
        thin.path.display(),
        arch
    );
    Ok(thin)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let container = open(&cli.path, cli.name)?;

    match cli.command {
        Command::Archs => print_archs(&container),

        Command::Extract { arch, out_dir } => {
            if !container.is_multi_arch() {
                bail!("{} is not a fat binary", container.path.display());
            }
            thin(container, &arch, &out_dir)?;
        }

        Command::Decompile {
            arch,
            ghidra_home,
            script_dir,
            script,
            project_dir,
            out_dir,
        } => {
            let container = match (container.is_multi_arch(), arch) {
                (false, _) => container,
                (true, Some(arch)) => thin(container, &arch, &out_dir)?,
                (true, None) => {
                    print_archs(&container);
                    bail!("fat binary: choose one of the architectures above with --arch");
                }
            };

            let mut analyzer = HeadlessAnalyzer::new(&ghidra_home)?.script(script);
            if let Some(dir) = script_dir {
                analyzer = analyzer.script_dir(dir);
            }

            let pending = ReportListener::bind("127.0.0.1:0")?.spawn()?;
            let port = pending.port();
            log::info!("Listening for the decompiler report on port {port}");

            let project_dir = match project_dir {
                Some(dir) => dir,
                None => container
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
            };
            analyzer
                .analyze(&project_dir, &container.display_name, &container.path, port)
                .context("headless analysis failed")?;

            let report = pending
                .finish()
                .context("failed to receive the decompiler report")?;

            let report_path = out_dir.join(format!("{}_report.json", container.display_name));
            let file = std::fs::File::create(&report_path)
                .with_context(|| format!("failed to create {}", report_path.display()))?;
            serde_json::to_writer_pretty(file, &report)?;

            println!(
                "{} {} functions across {} namespaces, {} segments -> {}",
                "Decompiled:".green().bold(),
                report.functions.len(),
                report.classes.len(),
                report.segments.len(),
                report_path.display()
            );
        }
    }

    Ok(())
}
