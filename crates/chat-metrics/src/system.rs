//! Best-effort host probes for the system snapshot.
//!
//! Every probe falls back to zeros or `"unknown"` instead of failing, so a
//! snapshot can always be produced.

use serde::{Deserialize, Serialize};

/// Identity fields captured once when the aggregator starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostIdentity {
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    pub version: String,
}

impl HostIdentity {
    pub fn detect() -> Self {
        Self {
            hostname: hostname(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Process memory in bytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_size: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub cores: usize,
}

pub fn hostname() -> String {
    read_hostname()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn read_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok()
}

#[cfg(not(unix))]
fn read_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

pub fn memory_usage() -> MemoryUsage {
    read_statm().unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn read_statm() -> Option<MemoryUsage> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut fields = statm.split_whitespace();
    let size: u64 = fields.next()?.parse().ok()?;
    let resident: u64 = fields.next()?.parse().ok()?;

    // SAFETY: sysconf has no memory-safety preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = u64::try_from(page_size).ok().filter(|size| *size > 0)?;

    Some(MemoryUsage {
        rss: resident * page_size,
        virtual_size: size * page_size,
    })
}

#[cfg(not(target_os = "linux"))]
fn read_statm() -> Option<MemoryUsage> {
    None
}

pub fn cpu_usage() -> CpuUsage {
    let [load1, load5, load15] = load_averages().unwrap_or([0.0; 3]);
    CpuUsage {
        load1,
        load5,
        load15,
        cores: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn load_averages() -> Option<[f64; 3]> {
    let mut loads = [0f64; 3];
    // SAFETY: `loads` holds exactly the three samples requested.
    let filled = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    (filled == 3).then_some(loads)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn load_averages() -> Option<[f64; 3]> {
    None
}
