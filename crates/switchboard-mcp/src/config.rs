//! How server scripts are turned into launchable processes.

use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Variables forwarded to every server when nothing else is configured.
pub const DEFAULT_FORWARD_ENV: &[&str] = &["METEOSTAT_RAPID_API_KEY"];

fn default_python_command() -> String {
    if cfg!(windows) { "python" } else { "python3" }.to_string()
}

fn default_node_command() -> String {
    "node".to_string()
}

fn default_forward_env() -> Vec<String> {
    DEFAULT_FORWARD_ENV.iter().map(|s| s.to_string()).collect()
}

/// The two script categories a server path may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Python,
    Node,
}

impl ServerKind {
    /// Classify a script by its extension (`.py` or `.js`, case-sensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(Self::Python),
            Some("js") => Some(Self::Node),
            _ => None,
        }
    }
}

/// Launch settings shared by all servers (`[servers]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    /// Interpreter for `.py` scripts.
    #[serde(default = "default_python_command")]
    pub python_command: String,
    /// Interpreter for `.js` scripts.
    #[serde(default = "default_node_command")]
    pub node_command: String,
    /// Variables copied from this process's environment into every server's
    /// environment. Unset variables are forwarded as empty strings.
    #[serde(default = "default_forward_env")]
    pub forward_env: Vec<String>,
    /// Extra variables set verbatim in every server's environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            python_command: default_python_command(),
            node_command: default_node_command(),
            forward_env: default_forward_env(),
            env: HashMap::new(),
            timeout_ms: None,
        }
    }
}

/// Everything needed to start one server process.
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    /// Position of the script in the startup argument list.
    pub index: usize,
    pub path: PathBuf,
    pub kind: ServerKind,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout_ms: Option<u64>,
}

impl ServerLaunch {
    /// Human-facing name, e.g. `server 2 (weather.py)`.
    pub fn label(&self) -> String {
        format!("server {} ({})", self.index + 1, self.path.display())
    }
}

impl LaunchSettings {
    /// Resolve the launch for the script at `index`, reading forwarded
    /// variables from the process environment.
    pub fn launch_for(&self, index: usize, path: &Path) -> Result<ServerLaunch, PoolError> {
        self.launch_with(index, path, |key| std::env::var(key).ok())
    }

    /// Like [`launch_for`](Self::launch_for) with an explicit variable lookup.
    pub fn launch_with(
        &self,
        index: usize,
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ServerLaunch, PoolError> {
        let kind = ServerKind::from_path(path).ok_or_else(|| PoolError::UnsupportedExtension {
            path: path.to_path_buf(),
        })?;
        let command = match kind {
            ServerKind::Python => self.python_command.clone(),
            ServerKind::Node => self.node_command.clone(),
        };

        let mut env: HashMap<String, String> = self
            .forward_env
            .iter()
            .map(|key| (key.clone(), lookup(key).unwrap_or_default()))
            .collect();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(ServerLaunch {
            index,
            path: path.to_path_buf(),
            kind,
            command,
            args: vec![path.to_string_lossy().into_owned()],
            env,
            timeout_ms: self.timeout_ms,
        })
    }
}
