//! プロジェクト記述子 (lamp.json) とプロジェクトレイアウト

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// プロジェクト記述子ファイル名
pub const PROJECT_DESCRIPTOR_FILE: &str = "lamp.json";

/// コンポーネントを格納するディレクトリ（ビルドコンテキストでもある）
pub const COMPONENTS_DIR: &str = "components";

/// ビルドコンテキストの除外ファイル
pub const DOCKERIGNORE_FILE: &str = ".dockerignore";

/// プロジェクトルートを上書きする環境変数
pub const PROJECT_ROOT_ENV: &str = "LAMP_PROJECT_ROOT";

/// lamp.json の内容
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectDescriptor {
    /// プロジェクト名（イメージタグの接頭辞）
    pub name: String,
    /// 公開対象のコンポーネント
    #[serde(default)]
    pub docker_images: Vec<String>,
}

impl ProjectDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ProjectDescriptor {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ProjectDescriptor {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// ルートディレクトリと記述子をまとめたプロジェクト
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub descriptor: ProjectDescriptor,
}

impl Project {
    pub fn load(root: &Path) -> Result<Self> {
        let descriptor = ProjectDescriptor::load(&root.join(PROJECT_DESCRIPTOR_FILE))?;
        debug!(project = %descriptor.name, root = %root.display(), "Loaded project descriptor");
        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn components_dir(&self) -> PathBuf {
        self.root.join(COMPONENTS_DIR)
    }

    pub fn dockerignore_path(&self) -> PathBuf {
        self.components_dir().join(DOCKERIGNORE_FILE)
    }

    /// components/ 直下のディレクトリをすべてコンポーネントとして列挙する
    pub fn discover_components(&self) -> Result<Vec<String>> {
        let mut components = Vec::new();
        for entry in std::fs::read_dir(self.components_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            components.push(name);
        }
        components.sort();
        debug!(?components, "Discovered components");
        Ok(components)
    }
}

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 LAMP_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって lamp.json を探す
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking LAMP_PROJECT_ROOT");
        if path.join(PROJECT_DESCRIPTOR_FILE).exists() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    let mut current = start_dir.clone();

    loop {
        if current.join(PROJECT_DESCRIPTOR_FILE).exists() {
            debug!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }

        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(ConfigError::ProjectRootNotFound(start_dir))
}
