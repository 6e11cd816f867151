use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("component.yaml is not valid YAML: {0}")]
    ComponentConfigSyntax(#[from] serde_yaml::Error),

    #[error("invalid component.yaml: '{key}' must be {expected}")]
    InvalidComponentConfig { key: String, expected: &'static str },

    #[error("Unsupported language for {component} component: {language}:{version}")]
    UnsupportedLanguage {
        component: String,
        language: String,
        version: String,
    },

    #[error("Unsupported python version for {component} component: {version}")]
    UnsupportedVersion { component: String, version: String },

    #[error("プロジェクト記述子の読み込みに失敗しました: {path}\n理由: {message}")]
    ProjectDescriptor { path: PathBuf, message: String },

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: lamp.json を含むディレクトリで実行するか LAMP_PROJECT_ROOT を指定してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
