//! Configuration loading: `name = expression` files, path specs, and the
//! environment entry point.
//!
//! Format, line by line:
//!
//! - a line whose *first byte* is `#` is a comment (whitespace before a
//!   `#` makes it a definition line, and a broken one);
//! - an empty line is skipped;
//! - otherwise the first `=` splits the line into name and expression.
//!
//! Bad lines are reported through the error channel and logged; loading
//! continues with the next line, and the success count is returned. A path
//! spec is a `:`-separated list of files and directories; directories are
//! walked recursively, skipping `.` and `..` as any walk does.

use crate::error::{self, DeriveError};
use crate::registry::{MetricRegistry, RegistryInner};
use metra_types::is_valid_name;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable naming the configuration path spec.
pub const CONFIG_ENV: &str = "METRA_CONFIG";

/// Separator between path-spec components.
pub const PATH_SEPARATOR: char = ':';

impl MetricRegistry {
    /// Register every definition in a configuration text.
    ///
    /// Returns the number of successful registrations. Per-line failures
    /// are published via [`error::last_error`] and logged, and do not stop
    /// the remaining lines.
    pub fn load_config(&self, text: &str) -> usize {
        let mut inner = self.lock();
        load_lines(&mut inner, text, None)
    }

    /// Load one configuration file.
    pub fn load_config_file(&self, path: &Path) -> Result<usize, DeriveError> {
        let mut inner = self.lock();
        load_file(&mut inner, path)
    }

    /// Load a `:`-separated list of files and directories.
    ///
    /// In tolerant mode, unreadable components are skipped with a warning
    /// instead of failing the load.
    pub fn load_path_spec(&self, spec: &str, tolerant: bool) -> Result<usize, DeriveError> {
        let mut inner = self.lock();
        let mut loaded = 0;

        for component in spec.split(PATH_SEPARATOR) {
            if component.is_empty() {
                continue;
            }
            let path = Path::new(component);
            if path.is_dir() {
                loaded += load_dir(&mut inner, path, tolerant)?;
            } else {
                match load_file(&mut inner, path) {
                    Ok(n) => loaded += n,
                    Err(err) if tolerant => {
                        warn!(%err, "skipping unreadable configuration component");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(loaded)
    }

    /// Load according to the environment:
    ///
    /// - `METRA_CONFIG` unset: load `default_dir` if it exists (tolerantly);
    /// - `METRA_CONFIG=""`: load nothing;
    /// - otherwise: treat the value as a path spec.
    pub fn load_from_env(&self, default_dir: &Path) -> Result<usize, DeriveError> {
        match env::var(CONFIG_ENV) {
            Err(_) => {
                if default_dir.is_dir() {
                    self.load_path_spec(&default_dir.to_string_lossy(), true)
                } else {
                    Ok(0)
                }
            }
            Ok(spec) if spec.is_empty() => Ok(0),
            Ok(spec) => self.load_path_spec(&spec, false),
        }
    }
}

fn load_file(inner: &mut RegistryInner, path: &Path) -> Result<usize, DeriveError> {
    let text = fs::read_to_string(path).map_err(|source| DeriveError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading derived metric configuration");
    Ok(load_lines(inner, &text, Some(path)))
}

fn load_dir(inner: &mut RegistryInner, dir: &Path, tolerant: bool) -> Result<usize, DeriveError> {
    let mut loaded = 0;
    let walk = walkdir::WalkDir::new(dir).min_depth(1).sort_by_file_name();
    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if tolerant {
                    warn!(%err, "skipping unreadable directory entry");
                    continue;
                }
                let path = err.path().unwrap_or(dir).to_path_buf();
                return Err(DeriveError::Config {
                    path,
                    source: err.into(),
                });
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match load_file(inner, entry.path()) {
            Ok(n) => loaded += n,
            Err(err) if tolerant => {
                warn!(%err, "skipping unreadable configuration file");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(loaded)
}

/// Process configuration lines, returning the success count.
fn load_lines(inner: &mut RegistryInner, text: &str, origin: Option<&Path>) -> usize {
    let mut loaded = 0;

    for (lineno, line) in text.lines().enumerate() {
        // Comment only when '#' is literally the first byte of the line.
        if line.as_bytes().first() == Some(&b'#') {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok((name, expr)) => match inner.register(name, expr, false) {
                Ok(_) => loaded += 1,
                Err(err) => report_line(origin, lineno + 1, &err.to_string()),
            },
            Err(diagnostic) => {
                error::set_last_error(diagnostic);
                report_line(origin, lineno + 1, diagnostic);
            }
        }
    }

    loaded
}

/// Split a definition line at its first `=`.
fn parse_line(line: &str) -> Result<(&str, &str), &'static str> {
    let (name, expr) = line.split_once('=').ok_or("Missing '=' in definition")?;
    let name = name.trim();
    let expr = expr.trim();
    if !is_valid_name(name) {
        return Err("Invalid derived metric name");
    }
    Ok((name, expr))
}

fn report_line(origin: Option<&Path>, lineno: usize, diagnostic: &str) {
    match origin {
        Some(path) => {
            warn!(path = %path.display(), lineno, diagnostic, "bad derived metric definition")
        }
        None => warn!(lineno, diagnostic, "bad derived metric definition"),
    }
}
