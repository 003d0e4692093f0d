use std::path::{Path, PathBuf};

const DEFAULT_UPLOAD_CONCURRENCY: usize = 2;
const DEFAULT_MAX_BREADCRUMB_DEPTH: usize = 64;
const DEFAULT_ALLOW_DUPLICATE_NAMES: bool = false;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub download_dir: PathBuf,
    pub upload_concurrency: usize,
    pub allow_duplicate_names: bool,
    pub max_breadcrumb_depth: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            allow_duplicate_names: DEFAULT_ALLOW_DUPLICATE_NAMES,
            max_breadcrumb_depth: DEFAULT_MAX_BREADCRUMB_DEPTH,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        let download_dir = std::env::var("DMS_DOWNLOAD_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| expand_with_home(&value, &home))
            .unwrap_or_else(default_download_dir);
        Self {
            download_dir,
            upload_concurrency: read_usize_env(
                "DMS_UPLOAD_CONCURRENCY",
                DEFAULT_UPLOAD_CONCURRENCY,
            ),
            allow_duplicate_names: read_bool_env(
                "DMS_ALLOW_DUPLICATE_NAMES",
                DEFAULT_ALLOW_DUPLICATE_NAMES,
            ),
            max_breadcrumb_depth: read_usize_env(
                "DMS_MAX_BREADCRUMB_DEPTH",
                DEFAULT_MAX_BREADCRUMB_DEPTH,
            ),
        }
    }

    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Self::default()
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(std::env::temp_dir)
}

pub(crate) fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_usize_env(name: &str, default: usize) -> usize {
    parse_positive(std::env::var(name).ok().as_deref()).unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(default)
}

fn parse_positive(value: Option<&str>) -> Option<usize> {
    value
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
