//! Configuration loading and parsing.
//!
//! Parses `quill.toml` (or an override path provided by the binary):
//!
//! ```toml
//! [undo]
//! levels = 5
//! low_memory = false
//! ```
//!
//! Missing sections and fields take their defaults. Unknown fields are
//! ignored. The raw `levels` value is kept as written; [`Config::undo_levels`]
//! clamps it to what the engine supports.

use anyhow::Result;
use core_undo::{DEFAULT_UNDO_LEVEL, MAX_UNDO_LEVEL, MIN_UNDO_LEVEL};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct UndoConfig {
    #[serde(default = "UndoConfig::default_levels")]
    pub levels: usize,
    #[serde(default)]
    pub low_memory: bool,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            levels: Self::default_levels(),
            low_memory: false,
        }
    }
}

impl UndoConfig {
    const fn default_levels() -> usize {
        DEFAULT_UNDO_LEVEL
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub undo: UndoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("quill.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("quill").join("quill.toml");
    }
    PathBuf::from("quill.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), levels = file.undo.levels, low_memory = file.undo.low_memory, "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            // Invalid files fall back to defaults.
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// History depth clamped to the engine's supported range.
    pub fn undo_levels(&self) -> usize {
        let raw = self.file.undo.levels;
        let clamped = raw.clamp(MIN_UNDO_LEVEL, MAX_UNDO_LEVEL);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                min = MIN_UNDO_LEVEL,
                max = MAX_UNDO_LEVEL,
                "undo_levels_clamped"
            );
        }
        clamped
    }

    pub fn low_memory(&self) -> bool {
        self.file.undo.low_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl Write for LockedWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.undo_levels(), 5);
        assert!(!cfg.low_memory());
    }

    #[test]
    fn parses_undo_section() {
        let tmp = write_config("[undo]\nlevels = 40\nlow_memory = true\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.undo.levels, 40);
        assert_eq!(cfg.undo_levels(), 40);
        assert!(cfg.low_memory());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let tmp = write_config("[undo]\nlow_memory = false\n[unrelated]\nkey = 1\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.undo.levels, 5);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let tmp = write_config("[undo]\nlevels = \"many\"\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.undo_levels(), 5);
    }

    #[test]
    fn levels_are_clamped_both_ways() {
        let low = load_from(Some(write_config("[undo]\nlevels = 1\n").path().to_path_buf())).unwrap();
        assert_eq!(low.file.undo.levels, 1);
        assert_eq!(low.undo_levels(), 5);
        let high = load_from(Some(write_config("[undo]\nlevels = 5000\n").path().to_path_buf())).unwrap();
        assert_eq!(high.undo_levels(), 200);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[undo]\nlevels = 999\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let levels = with_default(subscriber, || cfg.undo_levels());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("undo_levels_clamped"));
        assert_eq!(levels, 200);
    }
}
