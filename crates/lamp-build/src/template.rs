//! ビルド手順テンプレート
//!
//! 各ステップの Dockerfile はバイナリに埋め込まれている。プロジェクトに
//! `build/python/<name>.dockerfile` があればそちらを優先する。

use std::fmt;
use std::path::{Path, PathBuf};

/// プロジェクト側でテンプレートを上書きするディレクトリ
pub const TEMPLATE_OVERRIDE_DIR: &str = "build/python";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Aladdinize,
    AddPoetry,
    AddComponentPythonDependencies,
    AddComponentContent,
    Lobotomize,
    EchoMessage,
}

impl Template {
    pub fn name(self) -> &'static str {
        match self {
            Template::Aladdinize => "aladdinize",
            Template::AddPoetry => "add-poetry",
            Template::AddComponentPythonDependencies => "add-component-python-dependencies",
            Template::AddComponentContent => "add-component-content",
            Template::Lobotomize => "lobotomize",
            Template::EchoMessage => "echo-message",
        }
    }

    pub fn embedded(self) -> &'static str {
        match self {
            Template::Aladdinize => include_str!("../templates/aladdinize.dockerfile"),
            Template::AddPoetry => include_str!("../templates/add-poetry.dockerfile"),
            Template::AddComponentPythonDependencies => {
                include_str!("../templates/add-component-python-dependencies.dockerfile")
            }
            Template::AddComponentContent => {
                include_str!("../templates/add-component-content.dockerfile")
            }
            Template::Lobotomize => include_str!("../templates/lobotomize.dockerfile"),
            Template::EchoMessage => include_str!("../templates/echo-message.dockerfile"),
        }
    }

    /// プロジェクトの上書きを考慮して Dockerfile を決定する
    pub fn resolve(self, project_root: &Path) -> DockerfileSource {
        let path = project_root
            .join(TEMPLATE_OVERRIDE_DIR)
            .join(format!("{}.dockerfile", self.name()));

        if path.is_file() {
            tracing::debug!(template = self.name(), path = %path.display(), "Using project template");
            DockerfileSource::Path(path)
        } else {
            DockerfileSource::Embedded(self)
        }
    }
}

/// `docker build -f` に渡す Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerfileSource {
    /// ディスク上のファイル
    Path(PathBuf),
    /// 標準入力から渡す埋め込みテンプレート
    Embedded(Template),
}

impl fmt::Display for DockerfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerfileSource::Path(path) => write!(f, "{}", path.display()),
            DockerfileSource::Embedded(template) => write!(f, "<{}>", template.name()),
        }
    }
}
