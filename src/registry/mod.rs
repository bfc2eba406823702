//! Named SQL statements loaded from `.sql` files.
//!
//! A file is a sequence of blocks, each introduced by a `-- name=<identifier>` line:
//!
//! ```sql
//! -- name=get_user
//! SELECT id, name, email FROM users WHERE id = :id
//! -- name=get_all
//! SELECT id, name, email FROM users
//! ```

mod parser;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SqlMapperError;

pub use parser::{marker_name, parse_statements};

/// What to do when a file declares a name that another source already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Reject the whole file; the registry is left unchanged.
    #[default]
    Error,
    /// Replace the earlier statement and log a warning.
    Override,
}

/// One loaded statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementEntry {
    pub name: String,
    pub sql: Arc<str>,
    /// File the statement came from; `None` for in-memory sources.
    pub source: Option<PathBuf>,
}

/// Name to SQL template lookup, filled from `.sql` files.
///
/// Build it once at startup, then share it behind an `Arc`; lookups only need `&self`.
#[derive(Debug, Clone, Default)]
pub struct StatementRegistry {
    root: Option<PathBuf>,
    policy: CollisionPolicy,
    statements: HashMap<String, StatementEntry>,
}

impl StatementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose relative paths resolve against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Load statements from in-memory text.
    ///
    /// Passing the same `source` again replaces the statements it loaded before, so reloading
    /// a file is idempotent.
    ///
    /// # Errors
    /// Returns `SqlMapperError::DuplicateStatement` for a name declared twice in `text`, or
    /// declared by another source while the policy is [`CollisionPolicy::Error`].
    pub fn load_str(&mut self, source: Option<&Path>, text: &str) -> Result<usize, SqlMapperError> {
        let parsed = parse_statements(text)?;

        if self.policy == CollisionPolicy::Error {
            for (name, _) in &parsed {
                if let Some(existing) = self.statements.get(name)
                    && (source.is_none() || existing.source.as_deref() != source)
                {
                    return Err(SqlMapperError::DuplicateStatement {
                        name: name.clone(),
                        detail: format!(
                            "already loaded from {}",
                            SourceLabel(existing.source.as_deref())
                        ),
                    });
                }
            }
        }

        if let Some(src) = source {
            self.statements
                .retain(|_, entry| entry.source.as_deref() != Some(src));
        }

        let count = parsed.len();
        for (name, sql) in parsed {
            let entry = StatementEntry {
                name: name.clone(),
                sql: Arc::from(sql),
                source: source.map(Path::to_path_buf),
            };
            if let Some(previous) = self.statements.insert(name, entry) {
                tracing::warn!(
                    statement = %previous.name,
                    previous = %SourceLabel(previous.source.as_deref()),
                    replacement = %SourceLabel(source),
                    "statement overridden"
                );
            }
        }
        tracing::debug!(source = %SourceLabel(source), count, "loaded SQL statements");
        Ok(count)
    }

    /// Load one `.sql` file; relative paths resolve against the root.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Io` if the file cannot be read, plus the errors of
    /// [`load_str`](Self::load_str).
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, SqlMapperError> {
        let path = self.resolve(path.as_ref());
        let text = std::fs::read_to_string(&path).map_err(|e| SqlMapperError::io(&path, e))?;
        let source = std::fs::canonicalize(&path).unwrap_or(path);
        self.load_str(Some(&source), &text)
    }

    /// Load every `*.sql` file directly under the root, in file-name order.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` when no root is set, `SqlMapperError::Io` if the
    /// directory cannot be listed, and stops at the first file that fails to load.
    pub fn load_dir(&mut self) -> Result<usize, SqlMapperError> {
        let root = self.root.clone().ok_or_else(|| {
            SqlMapperError::ConfigError("statement registry has no SQL directory".into())
        })?;
        let mut files = std::fs::read_dir(&root)
            .map_err(|e| SqlMapperError::io(&root, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "sql"))
            .collect::<Vec<_>>();
        files.sort();

        let mut total = 0;
        for file in files {
            total += self.load_file(file)?;
        }
        Ok(total)
    }

    /// SQL template registered under `name`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::StatementNotFound` if no statement has that name.
    pub fn get(&self, name: &str) -> Result<Arc<str>, SqlMapperError> {
        self.statements
            .get(name)
            .map(|entry| Arc::clone(&entry.sql))
            .ok_or_else(|| SqlMapperError::StatementNotFound(name.to_owned()))
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&StatementEntry> {
        self.statements.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.statements.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.statements.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Read `filename` under the root without registering it: the whole file when `name` is
    /// `None`, otherwise the block declared under `name`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::Io` if the file cannot be read,
    /// `SqlMapperError::StatementNotFound` if `name` is not declared in it, or
    /// `SqlMapperError::DuplicateStatement` if the file declares a name twice.
    pub fn load_sql(&self, filename: &str, name: Option<&str>) -> Result<String, SqlMapperError> {
        let path = self.resolve(Path::new(filename));
        let text = std::fs::read_to_string(&path).map_err(|e| SqlMapperError::io(&path, e))?;
        let Some(name) = name else {
            return Ok(text);
        };
        parse_statements(&text)?
            .into_iter()
            .find_map(|(n, sql)| (n == name).then_some(sql))
            .ok_or_else(|| SqlMapperError::StatementNotFound(format!("{name} in {filename}")))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

struct SourceLabel<'a>(Option<&'a Path>);

impl fmt::Display for SourceLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<inline>"),
        }
    }
}
