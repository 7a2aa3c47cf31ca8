use crate::infrastructure::config::{ensure_default_config, load_app_config, AppConfig};
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "CALENDAR_TODO_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub token_path: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: &Path) -> Self {
        let state_dir = root.join("state");
        Self {
            root: root.to_path_buf(),
            config_dir: root.join("config"),
            token_path: state_dir.join("token.json"),
            state_dir,
            logs_dir: root.join("logs"),
        }
    }
}

#[derive(Debug)]
pub struct BootstrapResult {
    pub paths: WorkspacePaths,
    pub config: AppConfig,
}

/// `CALENDAR_TODO_HOME` when set, otherwise the current directory.
pub fn workspace_root() -> Result<PathBuf, InfraError> {
    resolve_workspace_root(std::env::var_os(HOME_ENV).map(PathBuf::from))
}

fn resolve_workspace_root(home: Option<PathBuf>) -> Result<PathBuf, InfraError> {
    match home.filter(|path| !path.as_os_str().is_empty()) {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let paths = WorkspacePaths::new(workspace_root);

    fs::create_dir_all(&paths.config_dir)?;
    fs::create_dir_all(&paths.state_dir)?;
    fs::create_dir_all(&paths.logs_dir)?;

    ensure_default_config(&paths.config_dir)?;
    let config = load_app_config(&paths.config_dir)?;

    Ok(BootstrapResult { paths, config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "calendar-todo-bootstrap-{}-{}",
                std::process::id(),
                sequence
            ));
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn bootstrap_creates_layout_and_default_config() {
        let workspace = TempWorkspace::new();
        let result = bootstrap_workspace(&workspace.path).expect("bootstrap");

        assert!(result.paths.config_dir.join("app.json").is_file());
        assert!(result.paths.state_dir.is_dir());
        assert!(result.paths.logs_dir.is_dir());
        assert_eq!(result.paths.token_path, workspace.path.join("state").join("token.json"));
        assert_eq!(result.config, AppConfig::default());
    }

    #[test]
    fn bootstrap_is_repeatable_and_keeps_existing_config() {
        let workspace = TempWorkspace::new();
        bootstrap_workspace(&workspace.path).expect("first bootstrap");
        fs::write(
            workspace.path.join("config").join("app.json"),
            r#"{ "schema": 1, "timezone": "Europe/Berlin" }"#,
        )
        .expect("customize config");

        let result = bootstrap_workspace(&workspace.path).expect("second bootstrap");
        assert_eq!(result.config.timezone, "Europe/Berlin");
    }

    #[test]
    fn bootstrap_surfaces_invalid_config() {
        let workspace = TempWorkspace::new();
        fs::create_dir_all(workspace.path.join("config")).expect("config dir");
        fs::write(workspace.path.join("config").join("app.json"), "{ not json").expect("write config");

        assert!(matches!(bootstrap_workspace(&workspace.path), Err(InfraError::Json(_))));
    }

    #[test]
    fn explicit_home_wins_over_current_directory() {
        let home = PathBuf::from("/srv/calendar-todo");
        assert_eq!(resolve_workspace_root(Some(home.clone())).expect("root"), home);
        assert_eq!(
            resolve_workspace_root(Some(PathBuf::new())).expect("root"),
            std::env::current_dir().expect("cwd")
        );
    }
}
