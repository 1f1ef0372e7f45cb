/// System-wide idle sampling: deltas of the cumulative tick counters in
/// /proc/stat, reduced to an idle percentage per polling interval.
use nix::errno::Errno;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Standard tick source on Linux.
const PROC_STAT: &str = "/proc/stat";

/// Counters that make up the total: user, nice, system, idle, iowait, irq,
/// softirq. Later fields (steal, guest) are not part of the sum.
const TICK_FIELDS: usize = 7;

/// Position of the idle counter within the tick fields.
const IDLE_FIELD: usize = 3;

/// One reading of the cumulative CPU counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    pub idle: u64,
    pub total: u64,
}

/// Errors while opening or reading the tick source. All of them are fatal to
/// the control loop.
#[derive(Debug)]
pub enum SampleError {
    /// Failed to open the tick source.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to re-read the first line.
    Read { source: std::io::Error },
    /// First line did not carry a cpu label and at least seven counters.
    Parse { line: String },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Open { path, source } => {
                write!(f, "failed to open {}: {}", path.display(), source)
            }
            SampleError::Read { source } => {
                write!(f, "failed to read tick source: {}", source)
            }
            SampleError::Parse { line } => {
                write!(f, "malformed cpu line: {:?}", line)
            }
        }
    }
}

impl std::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SampleError::Open { source, .. } => Some(source),
            SampleError::Read { source } => Some(source),
            SampleError::Parse { .. } => None,
        }
    }
}

impl SampleError {
    /// OS error code reported as the fatal exit status.
    pub fn errno(&self) -> i32 {
        match self {
            SampleError::Open { source, .. } | SampleError::Read { source } => {
                source.raw_os_error().unwrap_or(Errno::EIO as i32)
            }
            SampleError::Parse { .. } => Errno::EFAULT as i32,
        }
    }
}

/// Samples the idle percentage from cumulative tick counters.
///
/// The source is opened once and re-read in place on every sample. Each
/// percentage is the delta against the previous reading, so the first call
/// only establishes a baseline.
#[derive(Debug)]
pub struct IdleMonitor {
    file: File,
    prev: Option<CpuTicks>,
}

impl IdleMonitor {
    /// Open the standard Linux tick source.
    pub fn open() -> Result<Self, SampleError> {
        Self::from_path(Path::new(PROC_STAT))
    }

    /// Open an alternate tick source. Tests point this at a scratch file.
    pub fn from_path(path: &Path) -> Result<Self, SampleError> {
        let file = File::open(path).map_err(|source| SampleError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(IdleMonitor { file, prev: None })
    }

    /// Read the counters and return the idle percentage since the previous
    /// sample. `None` means no percentage is defined on this reading: the
    /// first call has no baseline, and a zero total delta has nothing to
    /// divide by.
    pub fn sample(&mut self) -> Result<Option<f64>, SampleError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| SampleError::Read { source })?;
        let mut line = String::new();
        BufReader::new(&self.file)
            .read_line(&mut line)
            .map_err(|source| SampleError::Read { source })?;
        let now = parse_cpu_line(&line).ok_or_else(|| SampleError::Parse {
            line: line.trim_end().to_string(),
        })?;
        let percent = self.prev.and_then(|prev| idle_percent(prev, now));
        self.prev = Some(now);
        Ok(percent)
    }
}

/// Parse the aggregate cpu line: a literal `cpu` label followed by at least
/// seven unsigned tick counters.
fn parse_cpu_line(line: &str) -> Option<CpuTicks> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return None;
    }
    let mut ticks = [0u64; TICK_FIELDS];
    for slot in ticks.iter_mut() {
        *slot = fields.next()?.parse().ok()?;
    }
    Some(CpuTicks {
        idle: ticks[IDLE_FIELD],
        total: ticks.iter().fold(0u64, |sum, t| sum.wrapping_add(*t)),
    })
}

/// Idle percentage over the interval between two readings. Deltas saturate,
/// so a counter source that wrapped or reset reads as zero elapsed ticks
/// rather than panicking.
fn idle_percent(prev: CpuTicks, now: CpuTicks) -> Option<f64> {
    let total = now.total.saturating_sub(prev.total);
    if total == 0 {
        return None;
    }
    let idle = now.idle.saturating_sub(prev.idle);
    Some(idle as f64 * 100.0 / total as f64)
}
