//! lamp component image builder
//!
//! component.yaml に従って、ベースイメージの上にステップごとのレイヤーを
//! 積み重ねてコンポーネントのイメージを作ります。各ステップに見せる
//! ビルドコンテキストは .dockerignore の一時書き換えで絞り込みます。

pub mod docker;
pub mod docker_cli;
pub mod dockerignore;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod steps;
pub mod template;

pub use docker::{DockerEngine, split_image_tag};
pub use docker_cli::DockerCli;
pub use dockerignore::{DockerIgnore, DockerIgnoreFile};
pub use engine::{BuildRequest, ImageEngine};
pub use error::{BuildError, BuildResult};
pub use orchestrator::Orchestrator;
pub use steps::ComponentBuilder;
pub use template::{DockerfileSource, Template};
