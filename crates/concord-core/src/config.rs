use crate::error::{ConcordError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "concord.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// EngineLogging
// ---------------------------------------------------------------------------

/// How much the engine reports about each flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineLogging {
    /// Warnings only.
    Off,
    /// One line per recorded action.
    #[default]
    Trace,
    /// Actions plus every synchronization firing and its bindings.
    Verbose,
}

impl EngineLogging {
    pub fn traces_actions(self) -> bool {
        matches!(self, Self::Trace | Self::Verbose)
    }

    pub fn traces_syncs(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

impl std::str::FromStr for EngineLogging {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "trace" => Ok(Self::Trace),
            "verbose" => Ok(Self::Verbose),
            other => Err(ConcordError::InvalidConfig(format!(
                "unknown engine logging level '{other}' (expected off, trace or verbose)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: EngineLogging,
    /// Abort a flow with `NoFixpoint` after this many evaluation passes.
    /// Unset means the engine relies on rule authors to avoid divergent cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// How long an excluded route waits for `Requesting.respond`.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "/api".to_string()
}

fn default_response_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_url: default_base_url(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoutesConfig
// ---------------------------------------------------------------------------

/// Which `Concept/operation` paths bypass synchronizations and which must go
/// through `Requesting.request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_included")]
    pub included: Vec<String>,
    #[serde(default = "default_excluded")]
    pub excluded: Vec<String>,
}

fn default_included() -> Vec<String> {
    [
        "RoomTemplate/getTemplate",
        "RoomTemplate/findTemplates",
        "DesignPost/getPost",
        "DesignPost/findPosts",
        "DesignPost/findPostsByAuthor",
        "Engagement/getEngagementForPost",
        "UserAccount/getUser",
        "UserAccount/getUserByUsername",
        "Session/validateSession",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded() -> Vec<String> {
    [
        "Auth/register",
        "Auth/login",
        "Auth/logout",
        "DesignPost/createPost",
        "DesignPost/editPost",
        "DesignPost/deletePost",
        "Engagement/toggleUpvote",
        "Engagement/addComment",
        "Engagement/editComment",
        "Engagement/deleteComment",
        "UserAccount/updateUserProfile",
        "RoomTemplate/addTemplate",
        "RoomTemplate/updateTemplate",
        "RoomTemplate/deleteTemplate",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            included: default_included(),
            excluded: default_excluded(),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessConfig / SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Kerberos names allowed to manage room templates. Empty means everyone.
    #[serde(default)]
    pub template_admins: Vec<String>,
}

impl AccessConfig {
    /// Apply `TEMPLATE_ADMIN_KERBEROS` (comma-separated) if it is set.
    pub fn with_env_override(mut self, value: Option<&str>) -> Self {
        if let Some(raw) = value {
            self.template_admins = raw
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

fn default_ttl_hours() -> u64 {
    7 * 24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. base_url must be an absolute path prefix
        if !self.server.base_url.starts_with('/') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "server.base_url '{}' must start with '/'",
                    self.server.base_url
                ),
            });
        }

        // 2. a zero timeout would fail every synchronized request
        if self.server.response_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "server.response_timeout_ms must be greater than zero".into(),
            });
        }

        // 3. route entries must look like Concept/operation
        for path in self.routes.included.iter().chain(&self.routes.excluded) {
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("route '{path}' is not of the form Concept/operation"),
                });
            }
        }

        // 4. a route cannot be both passed through and synchronized
        for path in &self.routes.included {
            if self.routes.excluded.contains(path) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "route '{path}' is both included and excluded; it will be excluded"
                    ),
                });
            }
        }

        if self.engine.max_passes == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.max_passes must be at least 1".into(),
            });
        }

        if self.sessions.ttl_hours == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "sessions.ttl_hours is 0; every session expires immediately".into(),
            });
        }

        warnings
    }

    /// Fail if `validate` reported any error-level warning.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConcordError::InvalidConfig(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.base_url, "/api");
        assert_eq!(cfg.engine.logging, EngineLogging::Trace);
        assert!(cfg.routes.excluded.contains(&"DesignPost/createPost".to_string()));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "server:\n  port: 9001\nengine:\n  logging: verbose\n  max_passes: 64\n",
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.port, 9001);
        assert_eq!(cfg.server.response_timeout_ms, 10_000);
        assert_eq!(cfg.engine.logging, EngineLogging::Verbose);
        assert_eq!(cfg.engine.max_passes, Some(64));
        assert_eq!(cfg.sessions.ttl_hours, 168);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut cfg = Config::default();
        cfg.access.template_admins = vec!["alice".into()];
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.access.template_admins, vec!["alice".to_string()]);
    }

    #[test]
    fn validate_flags_bad_routes_and_overlap() {
        let mut cfg = Config::default();
        cfg.routes.included.push("DesignPost/createPost".into());
        cfg.routes.excluded.push("not-a-route".into());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("both included")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("not-a-route")));
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn env_override_replaces_admins() {
        let access = AccessConfig {
            template_admins: vec!["old".into()],
        }
        .with_env_override(Some(" Alice, ,bob "));
        assert_eq!(access.template_admins, vec!["alice", "bob"]);
    }

    #[test]
    fn logging_level_parses_case_insensitively() {
        assert_eq!("VERBOSE".parse::<EngineLogging>().unwrap(), EngineLogging::Verbose);
        assert!("loud".parse::<EngineLogging>().is_err());
        assert!(EngineLogging::Trace.traces_actions());
        assert!(!EngineLogging::Trace.traces_syncs());
        assert!(!EngineLogging::Off.traces_actions());
    }
}
