use crate::delphi::archive::ArchiveKind;
use crate::delphi::consolidate::DEFAULT_PATTERN;
use crate::delphi::*;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

pub const DEFAULT_CATALOG_DIR: &str = "base";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommentPolicySettings {
    #[serde(rename = "requireOnRejection")]
    pub require_on_rejection: Option<bool>,
    #[serde(rename = "requireOnNotApplicable")]
    pub require_on_not_applicable: Option<bool>,
    #[serde(rename = "lowRelevanceMax")]
    pub low_relevance_max: Option<u8>,
}

impl CommentPolicySettings {
    pub fn policy(&self) -> DelphiResult<CommentPolicy> {
        let base = CommentPolicy::DEFAULT;
        if let Some(x) = self.low_relevance_max {
            if !(Relevance::MIN..=Relevance::MAX).contains(&x) {
                whatever!("lowRelevanceMax must be between 1 and 5, got {}", x)
            }
        }
        Ok(CommentPolicy {
            on_rejection: self.require_on_rejection.unwrap_or(base.on_rejection),
            on_not_applicable: self
                .require_on_not_applicable
                .unwrap_or(base.on_not_applicable),
            low_relevance_max: self.low_relevance_max.or(base.low_relevance_max),
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    pub kind: String,
    pub path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DelphiConfig {
    #[serde(rename = "catalogDirectory")]
    pub catalog_directory: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "submissionPattern")]
    pub submission_pattern: Option<String>,
    #[serde(rename = "voteColumn")]
    pub vote_column: Option<String>,
    #[serde(rename = "commentPolicy")]
    pub comment_policy: Option<CommentPolicySettings>,
    pub archive: Option<ArchiveSettings>,
}

pub fn read_config(path: &str) -> DelphiResult<DelphiConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: DelphiConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// The resolved settings shared by all the commands.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub catalog_dir: PathBuf,
    pub output_dir: PathBuf,
    pub submission_pattern: String,
    /// Detected from the consolidated header when not set.
    pub vote_column: Option<String>,
    pub policy: CommentPolicy,
    pub archive: ArchiveKind,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_dir: PathBuf::from(DEFAULT_CATALOG_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            submission_pattern: DEFAULT_PATTERN.to_string(),
            vote_column: None,
            policy: CommentPolicy::DEFAULT,
            archive: ArchiveKind::None,
        }
    }
}

fn resolve(root: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn archive_kind(root: &Path, archive: &ArchiveSettings) -> DelphiResult<ArchiveKind> {
    match (archive.kind.to_lowercase().as_str(), archive.path.as_deref()) {
        ("none", _) => Ok(ArchiveKind::None),
        ("directory", Some(p)) => Ok(ArchiveKind::Directory(resolve(root, p))),
        ("directory", None) => whatever!("archive: kind 'directory' needs a path"),
        ("git", p) => Ok(ArchiveKind::Git(resolve(root, p.unwrap_or(".")))),
        (k, _) => whatever!("archive: unknown kind {:?}", k),
    }
}

impl Settings {
    /// Settings from a configuration, relative paths being taken from `root`.
    pub fn from_config(config: &DelphiConfig, root: &Path) -> DelphiResult<Settings> {
        let policy = match &config.comment_policy {
            Some(cps) => cps.policy()?,
            None => CommentPolicy::DEFAULT,
        };
        let archive = match &config.archive {
            Some(a) => archive_kind(root, a)?,
            None => ArchiveKind::None,
        };
        Ok(Settings {
            catalog_dir: resolve(
                root,
                config
                    .catalog_directory
                    .as_deref()
                    .unwrap_or(DEFAULT_CATALOG_DIR),
            ),
            output_dir: resolve(
                root,
                config
                    .output_directory
                    .as_deref()
                    .unwrap_or(DEFAULT_OUTPUT_DIR),
            ),
            submission_pattern: config
                .submission_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            vote_column: config.vote_column.clone().filter(|v| !v.trim().is_empty()),
            policy,
            archive,
        })
    }

    /// Reads the configuration file if one is given, the defaults otherwise.
    pub fn load(config_path: Option<&str>) -> DelphiResult<Settings> {
        match config_path {
            None => Ok(Settings::default()),
            Some(path) => {
                let config = read_config(path)?;
                info!("Using configuration {}", path);
                let root = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
                Settings::from_config(&config, root)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paths_are_relative_to_the_config() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("delphi.json");
        fs::write(
            &p,
            r#"{"catalogDirectory": "dados/base", "outputDirectory": "/srv/delphi",
                "voteColumn": "voto_delphi",
                "archive": {"kind": "Directory", "path": "backup"}}"#,
        )
        .unwrap();
        let s = Settings::load(Some(p.to_str().unwrap())).unwrap();
        assert_eq!(s.catalog_dir, tmp.path().join("dados/base"));
        assert_eq!(s.output_dir, PathBuf::from("/srv/delphi"));
        assert_eq!(s.vote_column.as_deref(), Some("voto_delphi"));
        assert_eq!(s.submission_pattern, DEFAULT_PATTERN);
        assert_eq!(s.archive, ArchiveKind::Directory(tmp.path().join("backup")));
        assert_eq!(s.policy, CommentPolicy::DEFAULT);
    }

    #[test]
    fn comment_policy_settings() {
        let cps: CommentPolicySettings =
            serde_json::from_str(r#"{"lowRelevanceMax": 2}"#).unwrap();
        assert_eq!(cps.policy().unwrap(), CommentPolicy::STRICT);
        let cps: CommentPolicySettings =
            serde_json::from_str(r#"{"requireOnNotApplicable": false, "lowRelevanceMax": 9}"#)
                .unwrap();
        assert!(cps.policy().is_err());
    }

    #[test]
    fn unknown_archive_kind() {
        let config: DelphiConfig =
            serde_json::from_str(r#"{"archive": {"kind": "ftp"}}"#).unwrap();
        assert!(Settings::from_config(&config, Path::new(".")).is_err());
        let config: DelphiConfig = serde_json::from_str(r#"{"archive": {"kind": "git"}}"#).unwrap();
        assert_eq!(
            Settings::from_config(&config, Path::new("/data"))
                .unwrap()
                .archive,
            ArchiveKind::Git(PathBuf::from("/data/."))
        );
    }

    #[test]
    fn missing_config_file() {
        assert!(matches!(
            Settings::load(Some("/nonexistent/delphi.json")),
            Err(DelphiError::OpeningJson { .. })
        ));
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
