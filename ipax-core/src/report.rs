use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};

pub const END_CLASS_DATA: &str = "END_CLASS_DATA";
pub const END_MACHO_DATA: &str = "END_MACHO_DATA";
pub const END_DATA: &str = "END_DATA";

/// Function names grouped by owning namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFunctions {
    #[serde(rename = "ClassName")]
    pub class_name: String,
    #[serde(rename = "Functions", default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(default = "unnamed")]
    pub label: String,
    #[serde(default)]
    pub value: String,
    pub address: String,
}

fn unnamed() -> String {
    "Unnamed".to_string()
}

/// Defined data inside one memory block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub data: Vec<DataItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    #[serde(rename = "FunctionName")]
    pub function_name: String,
    #[serde(rename = "ClassName")]
    pub class_name: String,
    #[serde(rename = "DecompiledCode")]
    pub decompiled_code: String,
}

/// Everything the decompiler script sends for one binary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecompilationReport {
    pub classes: Vec<ClassFunctions>,
    pub segments: BTreeMap<String, Segment>,
    pub functions: Vec<FunctionRecord>,
}

/// Reads the three sentinel-terminated JSON payloads, in protocol order.
///
/// A stream that closes before its first byte is [`Error::NoReport`].
pub fn read_report<R: BufRead>(mut reader: R) -> Result<DecompilationReport> {
    if reader.fill_buf()?.is_empty() {
        return Err(Error::NoReport);
    }
    let classes = read_payload(&mut reader, END_CLASS_DATA)?;
    let segments = read_payload(&mut reader, END_MACHO_DATA)?;
    let functions = read_payload(&mut reader, END_DATA)?;
    Ok(DecompilationReport {
        classes,
        segments,
        functions,
    })
}

fn read_payload<T: DeserializeOwned, R: BufRead>(
    reader: &mut R,
    sentinel: &'static str,
) -> Result<T> {
    let mut payload = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::MissingSentinel(sentinel));
        }
        if line.trim_end() == sentinel {
            break;
        }
        payload.push_str(&line);
    }
    log::debug!("{sentinel}: {} bytes of payload", payload.len());
    Ok(serde_json::from_str(&payload)?)
}

/// Accepts the decompiler script's connection and reads its report.
#[derive(Debug)]
pub struct ReportListener {
    listener: TcpListener,
}

impl ReportListener {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.local_addr()?.port())
    }

    /// Blocks until one client connects, then reads a full report from it.
    pub fn accept_report(&self) -> Result<DecompilationReport> {
        let (stream, peer) = self.listener.accept()?;
        log::info!("Report connection from {peer}");
        read_report(BufReader::new(stream))
    }

    /// Accepts the report on a background thread.
    pub fn spawn(self) -> Result<PendingReport> {
        let addr = self.local_addr()?;
        let handle = thread::spawn(move || self.accept_report());
        Ok(PendingReport { addr, handle })
    }
}

/// A report being received in the background; see [`ReportListener::spawn`].
#[derive(Debug)]
pub struct PendingReport {
    addr: SocketAddr,
    handle: JoinHandle<Result<DecompilationReport>>,
}

impl PendingReport {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Collects the report once the sender has exited.
    ///
    /// If nobody connected, a dummy connection unblocks the accept and the
    /// result is [`Error::NoReport`].
    pub fn finish(self) -> Result<DecompilationReport> {
        if !self.handle.is_finished() {
            if let Err(e) = TcpStream::connect(self.addr) {
                log::warn!("could not wake report listener on {}: {e}", self.addr);
            }
        }
        match self.handle.join() {
            Ok(report) => report,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
