//! ビルド記述子
//!
//! コンポーネント設定と実行単位のパラメータ（プロジェクト名、ハッシュ、
//! デフォルトの言語バージョン）をまとめ、各ビルドステップが参照する
//! 値を導出します。ベースイメージから抽出した値は [`ResolvedImage`] として
//! 別に保持し、記述子自体は変更しません。

use crate::component::{ComponentConfig, UserInfo};
use crate::error::{ConfigError, Result};
use crate::project::Project;
use crate::{DEFAULT_POETRY_VERSION, DEFAULT_PYTHON_VERSION, LOCAL_HASH};
use std::path::{Path, PathBuf};

/// 現在サポートしている言語
pub const SUPPORTED_LANGUAGE: &str = "python";

/// 実行全体に共通するパラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    /// デプロイ先クラスタ (CLUSTER_NAME)
    pub cluster: String,
    /// ビルド識別子 (HASH)。`local` は開発ビルド
    pub hash: String,
    pub default_language_version: String,
    pub poetry_version: String,
}

impl RunParameters {
    pub fn new(cluster: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            hash: hash.into(),
            default_language_version: DEFAULT_PYTHON_VERSION.to_string(),
            poetry_version: DEFAULT_POETRY_VERSION.to_string(),
        }
    }
}

/// 1 コンポーネントのビルドに必要な情報
#[derive(Debug, Clone)]
pub struct BuildDescriptor {
    pub project: String,
    pub to_publish: Vec<String>,
    pub component: String,
    pub config: ComponentConfig,
    pub hash: String,
    pub default_language_version: String,
    pub poetry_version: String,
    components_dir: PathBuf,
}

impl BuildDescriptor {
    pub fn new(
        project: &Project,
        component: impl Into<String>,
        config: ComponentConfig,
        params: &RunParameters,
    ) -> Self {
        Self {
            project: project.name().to_string(),
            to_publish: project.descriptor.docker_images.clone(),
            component: component.into(),
            config,
            hash: params.hash.clone(),
            default_language_version: params.default_language_version.clone(),
            poetry_version: params.poetry_version.clone(),
            components_dir: project.components_dir(),
        }
    }

    pub fn components_dir(&self) -> &Path {
        &self.components_dir
    }

    /// イメージタグ: `{project}-{component}:{hash}`
    pub fn tag(&self) -> String {
        format!("{}-{}:{}", self.project, self.component, self.hash)
    }

    pub fn dev(&self) -> bool {
        self.hash == LOCAL_HASH
    }

    pub fn published(&self) -> bool {
        self.to_publish.iter().any(|c| c == &self.component)
    }

    pub fn language_name(&self) -> String {
        self.config
            .language_name()
            .unwrap_or_else(|| SUPPORTED_LANGUAGE.to_string())
    }

    /// 設定されたバージョン、なければデフォルトのバージョン
    pub fn language_version(&self) -> String {
        self.config
            .language_version()
            .unwrap_or_else(|| self.default_language_version.clone())
    }

    pub fn poetry_no_dev(&self) -> &'static str {
        if self.dev() { "" } else { "--no-dev" }
    }

    pub fn python_optimize(&self) -> &'static str {
        if self.dev() { "" } else { "-O" }
    }

    pub fn base_image(&self) -> String {
        match self.config.image_base() {
            Some(base) => base.to_string(),
            None => format!("python:{}-slim", self.language_version()),
        }
    }

    pub fn aladdinize(&self) -> bool {
        self.config.image_aladdinize().unwrap_or(true)
    }

    /// poetry は開発ビルドでのみ追加する
    pub fn add_poetry(&self) -> bool {
        self.dev() && self.config.image_add_poetry().unwrap_or(true)
    }

    /// コンポーネント固有の Dockerfile
    pub fn specialized_dockerfile(&self) -> Option<PathBuf> {
        let path = self.components_dir.join(&self.component).join("Dockerfile");
        path.is_file().then_some(path)
    }

    /// 指定したコンポーネントに pyproject.toml と poetry.lock の両方があるか
    pub fn has_python_dependencies(&self, component: &str) -> bool {
        let dir = self.components_dir.join(component);
        dir.join("pyproject.toml").is_file() && dir.join("poetry.lock").is_file()
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.config.dependencies()
    }

    /// ビルド前に言語とバージョンを検証する
    pub fn check_language(&self) -> Result<()> {
        let language = self.language_name();
        let version = self.language_version();

        if language != SUPPORTED_LANGUAGE {
            return Err(ConfigError::UnsupportedLanguage {
                component: self.component.clone(),
                language,
                version,
            });
        }

        // Python 3 系のみサポート
        if !version.starts_with('3') {
            return Err(ConfigError::UnsupportedVersion {
                component: self.component.clone(),
                version,
            });
        }

        Ok(())
    }
}

/// ベースイメージから確定した値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub language_version: String,
    pub user: UserInfo,
}

impl ResolvedImage {
    /// ベースイメージと同じ Python バージョンのビルダーイメージ
    pub fn builder_image(&self) -> String {
        format!("python:{}-slim", self.language_version)
    }
}
