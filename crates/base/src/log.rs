use {
    anyhow::Result,
    std::{
        fs::{File, OpenOptions, create_dir_all},
        io::Write,
        path::PathBuf,
        sync::Mutex,
        time::{SystemTime, UNIX_EPOCH},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
            Level::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Append-only log sink. Implementations must not block for long and must
/// never fail the caller; write errors are handled inside the sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, file: &str, line: usize, message: &str);
}

pub static LOGGER: Mutex<Option<Box<dyn Logger>>> = Mutex::new(None);

/// Hand a message to the global logger, if one is installed.
pub fn dispatch(level: Level, file: &str, line: usize, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        logger.log(level, file, line, message);
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Format current time as YYYY-MM-DDTHH:MM:SS.mmm (UTC)
pub fn format_timestamp() -> String {
    format_timestamp_millis(now_millis())
}

pub fn format_timestamp_millis(millis: u128) -> String {
    let secs = (millis / 1000) as u64;
    let ms = (millis % 1000) as u32;
    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let (year, month, day) = civil_from_days(days as i64);
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        year, month, day, hours, minutes, seconds, ms
    )
}

/// Format current date as YYYY-MM-DD (UTC)
pub fn format_today() -> String {
    let secs = (now_millis() / 1000) as u64;
    let days = secs / 86400;
    let (year, month, day) = civil_from_days(days as i64);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

// Howard Hinnant's days-to-civil algorithm
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn format_line(level: Level, file: &str, line: usize, message: &str) -> String {
    let timestamp = format_timestamp();
    let thread_id = std::thread::current().id();
    format!(
        "[{:?}:{}:{} - {}:{}] {}",
        thread_id, level, timestamp, file, line, message
    )
}

pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn log(&self, level: Level, file: &str, line: usize, message: &str) {
        println!("{}", format_line(level, file, line, message));
    }
}

pub fn init_stdout_logger() {
    LOGGER
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .replace(Box::new(StdoutLogger));
}

struct FileLoggerState {
    dir: PathBuf,
    current_date: String,
    file: File,
}

/// Writes to `<dir>/<YYYY-MM-DD>.log`, rolling over to a new file when the
/// date changes.
pub struct FileLogger {
    state: Mutex<FileLoggerState>,
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_dir_all(&dir)?;
        let current_date = format_today();
        let path = dir.join(format!("{}.log", current_date));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(FileLogger {
            state: Mutex::new(FileLoggerState {
                dir,
                current_date,
                file,
            }),
        })
    }
}

impl Logger for FileLogger {
    fn log(&self, level: Level, file: &str, line: usize, message: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let today = format_today();
        if today != state.current_date {
            let new_path = state.dir.join(format!("{}.log", today));
            match OpenOptions::new().create(true).append(true).open(&new_path) {
                Ok(new_file) => {
                    state.file = new_file;
                    state.current_date = today;
                }
                Err(error) => {
                    eprintln!("Failed to open new log file {:?}: {}", new_path, error);
                }
            }
        }
        let log_line = format!("{}\n", format_line(level, file, line, message));
        if let Err(error) = state.file.write_all(log_line.as_bytes()) {
            eprintln!("Failed to write to log file: {}", error);
            eprintln!("{}", log_line.trim_end());
        }
    }
}

pub fn init_file_logger(dir: impl Into<PathBuf>) -> Result<()> {
    let logger = FileLogger::new(dir)?;
    LOGGER
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .replace(Box::new(logger));
    Ok(())
}

struct FacadeBridge;

impl ::log::Log for FacadeBridge {
    fn enabled(&self, _metadata: &::log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &::log::Record) {
        let level = match record.level() {
            ::log::Level::Error => Level::Error,
            ::log::Level::Warn => Level::Warn,
            ::log::Level::Info => Level::Info,
            ::log::Level::Debug | ::log::Level::Trace => Level::Debug,
        };
        let message = record.args().to_string();
        dispatch(
            level,
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0) as usize,
            &message,
        );
    }

    fn flush(&self) {}
}

/// Route records emitted through the `log` crate macros into `LOGGER`.
///
/// Debug builds pass everything through, release builds drop debug and trace
/// records. Only the first call per process installs the bridge.
pub fn init_log_bridge() {
    static BRIDGE: FacadeBridge = FacadeBridge;

    let max_level = if cfg!(debug_assertions) {
        ::log::LevelFilter::Debug
    } else {
        ::log::LevelFilter::Info
    };

    if ::log::set_logger(&BRIDGE).is_ok() {
        ::log::set_max_level(max_level);
    }
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{ if cfg!(debug_assertions) { let message = format_args!($($arg)*).to_string(); $crate::log::dispatch($crate::log::Level::Debug, file!(), line!() as usize, &message); } }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let message = format_args!($($arg)*).to_string(); $crate::log::dispatch($crate::log::Level::Info, file!(), line!() as usize, &message); }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{ let message = format_args!($($arg)*).to_string(); $crate::log::dispatch($crate::log::Level::Warn, file!(), line!() as usize, &message); }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{ let message = format_args!($($arg)*).to_string(); $crate::log::dispatch($crate::log::Level::Error, file!(), line!() as usize, &message); }};
}

#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {{ let message = format_args!($($arg)*).to_string(); $crate::log::dispatch($crate::log::Level::Fatal, file!(), line!() as usize, &message); println!("FATAL ERROR: {}", message); std::process::exit(1); }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civil_from_days_epoch() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }

    #[test]
    fn test_civil_from_days_leap_year() {
        // 2000-02-29
        assert_eq!(civil_from_days(11016), (2000, 2, 29));
    }

    #[test]
    fn test_format_timestamp_millis() {
        // 2024-12-31T23:59:59.042
        let millis = (20088u128 * 86400 + 86399) * 1000 + 42;
        assert_eq!(format_timestamp_millis(millis), "2024-12-31T23:59:59.042");
    }

    #[test]
    fn test_file_logger_day_rollover() {
        let test_dir =
            std::env::temp_dir().join(format!("base-log-test-{}-rollover", std::process::id()));
        let _ = std::fs::remove_dir_all(&test_dir);

        let logger = FileLogger::new(&test_dir).expect("Failed to create FileLogger");
        let stale_path = test_dir.join("1999-01-01.log");
        {
            let mut state = logger.state.lock().unwrap();
            state.current_date = "1999-01-01".to_string();
            state.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&stale_path)
                .unwrap();
        }

        logger.log(Level::Info, "test.rs", 1, "after rollover");

        let today_path = test_dir.join(format!("{}.log", format_today()));
        let content = std::fs::read_to_string(&today_path).unwrap();
        assert!(content.contains("after rollover"));
        assert!(std::fs::read_to_string(&stale_path).unwrap().is_empty());

        std::fs::remove_dir_all(&test_dir).ok();
    }
}
