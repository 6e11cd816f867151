//! Docker を使った [`ImageEngine`] の実装
//!
//! イメージの確認・pull・タグ付け・削除は Docker API (bollard) で行う。
//! ビルドと調査用コンテナの実行は [`DockerCli`] に任せる。

use crate::docker_cli::{DockerCli, OUTPUT_INDENT};
use crate::engine::{BuildRequest, ImageEngine};
use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::path::PathBuf;
use tracing::{debug, info};

/// イメージ名とタグを分離
/// 例: "redis:7-alpine" -> ("redis", "7-alpine")
///     "localhost:5000/app" -> ("localhost:5000/app", "latest")
pub fn split_image_tag(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, "latest"),
    }
}

/// ローカルの Docker デーモンと `docker` CLI を使うエンジン
pub struct DockerEngine {
    docker: Docker,
    cli: DockerCli,
}

impl DockerEngine {
    pub fn new(docker: Docker, cli: DockerCli) -> Self {
        Self { docker, cli }
    }

    /// ローカルの Docker デーモンに接続
    pub fn connect(context_dir: impl Into<PathBuf>) -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker, DockerCli::new(context_dir)))
    }
}

#[async_trait]
impl ImageEngine for DockerEngine {
    async fn image_exists(&self, image: &str) -> BuildResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => Ok(false),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    async fn pull_image(&self, image: &str) -> BuildResult<()> {
        let (image_name, tag) = split_image_tag(image);
        info!("Pulling image: {}", image);

        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions {
            from_image: image_name,
            tag,
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(info) = stream.next().await {
            let info = info?;
            if let Some(status) = info.status {
                debug!(
                    "{}{} {}",
                    " ".repeat(OUTPUT_INDENT),
                    status,
                    info.progress.unwrap_or_default()
                );
            }
        }

        info!("Pulled image: {}", image);
        Ok(())
    }

    async fn tag_image(&self, source: &str, target: &str) -> BuildResult<()> {
        let (repo, tag) = split_image_tag(target);

        let options = bollard::query_parameters::TagImageOptions {
            repo: Some(repo.to_string()),
            tag: Some(tag.to_string()),
        };

        self.docker.tag_image(source, Some(options)).await?;
        debug!("Tagged {} as {}", source, target);
        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> BuildResult<()> {
        self.cli.build(request).await
    }

    async fn run_in_image(&self, image: &str, script: &str) -> BuildResult<String> {
        self.cli.run(image, script).await
    }

    async fn remove_image(&self, image: &str) -> BuildResult<()> {
        self.docker
            .remove_image(
                image,
                None::<bollard::query_parameters::RemoveImageOptions>,
                None,
            )
            .await?;
        debug!("Removed image: {}", image);
        Ok(())
    }
}
