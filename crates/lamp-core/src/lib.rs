//! lamp core
//!
//! コンポーネント設定 (component.yaml)、プロジェクト記述子 (lamp.json)、
//! およびイメージビルドの入力となるビルド記述子を提供します。

pub mod component;
pub mod descriptor;
pub mod error;
pub mod project;

pub use component::{ComponentConfig, Setting, UserInfo, load_component_config};
pub use descriptor::{BuildDescriptor, ResolvedImage, RunParameters};
pub use error::{ConfigError, Result};
pub use project::{Project, ProjectDescriptor, find_project_root};

/// デフォルトの Python バージョン
pub const DEFAULT_PYTHON_VERSION: &str = "3.8";

/// デフォルトの poetry バージョン
pub const DEFAULT_POETRY_VERSION: &str = "1.0.5";

/// 開発ビルドを表すハッシュ値
pub const LOCAL_HASH: &str = "local";
