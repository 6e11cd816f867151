use lamp_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Command failed: {command} ({status})")]
    CommandFailed { command: String, status: String },

    #[error("Unexpected probe output: {0}")]
    UnexpectedProbeOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::Config(ConfigError::InvalidComponentConfig { .. }) => {
                format!(
                    "{}\n\
                     \n\
                     component.yaml の内容を確認してください。",
                    self
                )
            }
            BuildError::DockerConnection(e) => {
                format!(
                    "Dockerに接続できません: {}\n\
                     \n\
                     Docker デーモンが起動しているか確認してください。",
                    e
                )
            }
            BuildError::CommandFailed { command, .. } => {
                format!(
                    "{}\n\
                     \n\
                     `{}` の出力は -v (RUST_LOG=debug) で確認できます。",
                    self, command
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
