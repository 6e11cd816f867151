//! イメージ操作の抽象化
//!
//! ビルドステップは [`ImageEngine`] だけを通して Docker を操作する。
//! 実装は [`crate::docker::DockerEngine`]。

use crate::error::BuildResult;
use crate::template::DockerfileSource;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// `docker build` 1 回分のリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: DockerfileSource,
    pub tag: String,
    /// 出力を安定させるためキー順に並べる
    pub build_args: BTreeMap<String, String>,
}

impl BuildRequest {
    pub fn new(dockerfile: DockerfileSource, tag: impl Into<String>) -> Self {
        Self {
            dockerfile,
            tag: tag.into(),
            build_args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.build_args.insert(key.to_string(), value.into());
        self
    }

    pub fn build_arg(&self, key: &str) -> Option<&str> {
        self.build_args.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// ローカルにイメージが存在するか
    async fn image_exists(&self, image: &str) -> BuildResult<bool>;

    /// レジストリからイメージを取得
    async fn pull_image(&self, image: &str) -> BuildResult<()>;

    /// `source` に `target` タグを付ける
    async fn tag_image(&self, source: &str, target: &str) -> BuildResult<()>;

    /// コンテキスト (components/) を使ってイメージをビルド
    async fn build_image(&self, request: &BuildRequest) -> BuildResult<()>;

    /// イメージ内でシェルスクリプトを実行し、標準出力を返す
    async fn run_in_image(&self, image: &str, script: &str) -> BuildResult<String>;

    async fn remove_image(&self, image: &str) -> BuildResult<()>;
}
