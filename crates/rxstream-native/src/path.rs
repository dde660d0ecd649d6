//! Stream name resolution
//!
//! Turns a stream name into a fully qualified path: `~` expands to the home
//! directory, relative names are joined to the working directory, and `.` /
//! `..` components are folded lexically. Program lookup searches `PATH`.

use std::path::{Component, Path, PathBuf};

/// Resolves stream names to absolute paths
pub trait NameResolver: Send + Sync {
    /// Fully qualified path for `name`, or `None` if it cannot be formed
    fn qualify(&self, name: &str) -> Option<PathBuf>;

    /// Locate a program by name on the search path
    fn search_path(&self, name: &str) -> Option<PathBuf>;
}

/// Resolver backed by the process environment
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    home: Option<PathBuf>,
    cwd: Option<PathBuf>,
    search: Option<Vec<PathBuf>>,
}

impl SystemResolver {
    /// Resolve against `$HOME`, the current directory and `$PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed home directory instead of `$HOME`
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Use a fixed working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Use a fixed list of directories instead of `$PATH`
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search = Some(dirs);
        self
    }

    fn home(&self) -> Option<PathBuf> {
        self.home
            .clone()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
    }

    fn cwd(&self) -> Option<PathBuf> {
        self.cwd.clone().or_else(|| std::env::current_dir().ok())
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        match &self.search {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default(),
        }
    }
}

impl NameResolver for SystemResolver {
    fn qualify(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let joined = if name == "~" {
            self.home()?
        } else if let Some(rest) = name.strip_prefix("~/") {
            self.home()?.join(rest)
        } else if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            self.cwd()?.join(name)
        };

        Some(normalize_path(&joined))
    }

    fn search_path(&self, name: &str) -> Option<PathBuf> {
        if name.contains('/') {
            return self.qualify(name).filter(|path| path.is_file());
        }
        self.search_dirs()
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .and_then(|found| self.qualify(&found.to_string_lossy()))
    }
}

/// Lexically resolve `.` and `..` in an absolute path
///
/// Symlinks are not consulted. `..` at the root stays at the root, and
/// repeated separators collapse.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    normalized
}
