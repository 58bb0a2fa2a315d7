use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub trait Logger: Send + Sync {
    fn log(&mut self, message: &str);
    fn debug_log(&mut self, message: &str);
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Writes timestamped lines to stderr so stdout stays clean for `lan-ip`.
#[derive(Debug, Default)]
pub struct ConsoleLogger {
    debug: bool,
}

impl ConsoleLogger {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Logger for ConsoleLogger {
    fn log(&mut self, message: &str) {
        eprintln!("{}: {}", timestamp(), message);
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            eprintln!("{}: [DEBUG] {}", timestamp(), message);
        }
    }
}

#[derive(Debug)]
pub struct FileLogger {
    log_file: PathBuf,
    debug: bool,
}

impl FileLogger {
    pub fn new(log_file: &Path, debug: bool) -> std::io::Result<Self> {
        // Create log directory if it doesn't exist
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(FileLogger {
            log_file: log_file.to_path_buf(),
            debug,
        })
    }

    fn write_to_file(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        writeln!(file, "{}: {}", timestamp(), message)
    }
}

impl Logger for FileLogger {
    fn log(&mut self, message: &str) {
        if let Err(e) = self.write_to_file(message) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            if let Err(e) = self.write_to_file(&format!("[DEBUG] {}", message)) {
                eprintln!("Failed to write debug log: {}", e);
            }
        }
    }
}

// MultiLogger allows logging to multiple destinations
pub struct MultiLogger {
    loggers: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new(loggers: Vec<Box<dyn Logger>>) -> Self {
        Self { loggers }
    }
}

impl Logger for MultiLogger {
    fn log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.log(message);
        }
    }

    fn debug_log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.debug_log(message);
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockLogger {
    pub logs: Vec<String>,
}

#[cfg(test)]
impl MockLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl Logger for MockLogger {
    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn debug_log(&mut self, message: &str) {
        self.logs.push(format!("DEBUG: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_logger_appends_and_filters_debug() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs/pki.log");

        let mut quiet = FileLogger::new(&path, false).unwrap();
        quiet.log("first");
        quiet.debug_log("hidden");

        let mut verbose = FileLogger::new(&path, true).unwrap();
        verbose.debug_log("shown");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": first"));
        assert!(lines[1].ends_with(": [DEBUG] shown"));
    }

    #[test]
    fn multi_logger_fans_out_to_every_sink() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.log");
        let b = temp_dir.path().join("b.log");

        let mut logger = MultiLogger::new(vec![
            Box::new(FileLogger::new(&a, false).unwrap()),
            Box::new(FileLogger::new(&b, false).unwrap()),
        ]);
        logger.log("hello");

        assert!(fs::read_to_string(&a).unwrap().contains("hello"));
        assert!(fs::read_to_string(&b).unwrap().contains("hello"));
    }
}
