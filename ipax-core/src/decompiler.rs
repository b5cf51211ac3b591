use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// A single external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Executes invocations on behalf of [`HeadlessAnalyzer`].
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs invocations as child processes and forwards their output to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        log::info!("Running {}", invocation.command_line());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr on its own thread so neither pipe can fill up and stall
        // the child.
        let stderr = child.stderr.take().map(|err| {
            thread::spawn(move || forward_lines(err, |line| log::warn!("{line}")))
        });
        if let Some(out) = child.stdout.take() {
            forward_lines(out, |line| log::debug!("{line}"));
        }
        if let Some(handle) = stderr {
            let _ = handle.join();
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                program: invocation.program.display().to_string(),
                status,
            })
        }
    }
}

fn forward_lines<R: Read>(stream: R, mut emit: impl FnMut(&str)) {
    for line in BufReader::new(stream).lines().map_while(|l| l.ok()) {
        emit(&line);
    }
}

/// Drives a Ghidra installation's `analyzeHeadless` launcher.
#[derive(Debug, Clone)]
pub struct HeadlessAnalyzer<R: CommandRunner = ProcessRunner> {
    launcher: PathBuf,
    script_dir: Option<PathBuf>,
    script: String,
    runner: R,
}

pub const DEFAULT_SCRIPT: &str = "DumpClassData.java";

impl HeadlessAnalyzer<ProcessRunner> {
    pub fn new<P: AsRef<Path>>(install_dir: P) -> Result<Self> {
        Self::with_runner(install_dir, ProcessRunner)
    }
}

impl<R: CommandRunner> HeadlessAnalyzer<R> {
    /// Locates `support/analyzeHeadless` under `install_dir`.
    pub fn with_runner<P: AsRef<Path>>(install_dir: P, runner: R) -> Result<Self> {
        let launcher = launcher_path(install_dir.as_ref());
        if !launcher.is_file() {
            return Err(Error::ToolNotFound(launcher));
        }
        Ok(Self {
            launcher,
            script_dir: None,
            script: DEFAULT_SCRIPT.to_string(),
            runner,
        })
    }

    pub fn script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    pub fn script(mut self, name: impl Into<String>) -> Self {
        self.script = name.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Builds the import-and-dump invocation. The post script receives
    /// `port` as its only argument and reports back over that socket.
    pub fn invocation(
        &self,
        project_dir: &Path,
        display_name: &str,
        binary: &Path,
        port: u16,
    ) -> Invocation {
        let mut inv = Invocation::new(&self.launcher)
            .arg(project_dir)
            .arg(project_name(display_name))
            .arg("-import")
            .arg(binary);
        if let Some(dir) = &self.script_dir {
            inv = inv.arg("-scriptPath").arg(dir);
        }
        inv.arg("-postScript")
            .arg(&self.script)
            .arg(port.to_string())
            .arg("-deleteProject")
    }

    pub fn analyze(
        &self,
        project_dir: &Path,
        display_name: &str,
        binary: &Path,
        port: u16,
    ) -> Result<()> {
        let inv = self.invocation(project_dir, display_name, binary, port);
        self.runner.run(&inv)?;
        log::info!("Finished headless analysis of {}", binary.display());
        Ok(())
    }
}

pub fn project_name(display_name: &str) -> String {
    format!("{display_name}_ipax")
}

fn launcher_path(install_dir: &Path) -> PathBuf {
    let name = if cfg!(windows) {
        "analyzeHeadless.bat"
    } else {
        "analyzeHeadless"
    };
    install_dir.join("support").join(name)
}
