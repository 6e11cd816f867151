//! コンポーネントイメージのビルドステップ
//!
//! すべてのステップは同じタグを再ビルドする。各ステップの出力が前の
//! タグを置き換えるので、中間タグを残さずにレイヤーを積み重ねられる。

use crate::dockerignore::DockerIgnoreFile;
use crate::engine::{BuildRequest, ImageEngine};
use crate::error::{BuildError, BuildResult};
use crate::template::{DockerfileSource, Template};
use lamp_core::{BuildDescriptor, ResolvedImage, UserInfo};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// ベースイメージの調査に使う使い捨てイメージのタグ
pub const PROBE_IMAGE: &str = "user_extractor";

pub const PYTHON_VERSION_SCRIPT: &str =
    "python -c 'import platform; print(platform.python_version())'";

pub const USER_INFO_SCRIPT: &str = "whoami; groups; echo $HOME";

/// 調査に失敗した場合のユーザー
fn fallback_user() -> UserInfo {
    UserInfo::new("root", "root", "/root")
}

/// 1 コンポーネント分のビルドを実行する
pub struct ComponentBuilder<'a, E: ImageEngine> {
    engine: &'a E,
    descriptor: &'a BuildDescriptor,
    dockerignore: &'a mut DockerIgnoreFile,
    project_root: &'a Path,
}

impl<'a, E: ImageEngine> ComponentBuilder<'a, E> {
    pub fn new(
        engine: &'a E,
        descriptor: &'a BuildDescriptor,
        dockerignore: &'a mut DockerIgnoreFile,
        project_root: &'a Path,
    ) -> Self {
        Self {
            engine,
            descriptor,
            dockerignore,
            project_root,
        }
    }

    fn template(&self, template: Template) -> DockerfileSource {
        template.resolve(self.project_root)
    }

    /// component.yaml の設定に従ってイメージをビルドする
    ///
    /// ベースイメージのタグ付けから始め、poetry やコンポーネントの依存関係を
    /// 順に追加していく。
    pub async fn build(&mut self) -> BuildResult<ResolvedImage> {
        let descriptor = self.descriptor;

        // 以降のステップはこのタグを新しいイメージへ付け替えていく
        self.tag_base_image().await?;

        // image.aladdinize: false で無効化
        if descriptor.aladdinize() {
            self.aladdinize_image().await?;
        }

        // コンポーネントに Dockerfile がある場合のみ
        if let Some(dockerfile) = descriptor.specialized_dockerfile() {
            self.build_specialized_image(dockerfile).await?;
        }

        let resolved = self.inspect_image().await?;

        // image.add_poetry: false で無効化
        if descriptor.add_poetry() {
            self.add_poetry(&resolved).await?;
        }

        self.add_dependencies(&resolved).await?;
        self.add_component(&resolved, &descriptor.component).await?;

        Ok(resolved)
    }

    /// 起点となるベースイメージにタグを付ける
    ///
    /// image.base が指定されていなければデフォルトの Python イメージを使う。
    pub async fn tag_base_image(&self) -> BuildResult<()> {
        let base_image = self.descriptor.base_image();
        info!(
            "Tagging base image '{}' for {} component",
            base_image, self.descriptor.component
        );

        if !self.engine.image_exists(&base_image).await? {
            self.engine.pull_image(&base_image).await?;
        }
        self.engine
            .tag_image(&base_image, &self.descriptor.tag())
            .await
    }

    /// 標準ユーザーと WORKDIR (/code) を追加する
    pub async fn aladdinize_image(&self) -> BuildResult<()> {
        let d = self.descriptor;
        info!("Adding aladdin boilerplate to {} component", d.component);

        let request = BuildRequest::new(self.template(Template::Aladdinize), d.tag())
            .arg("FROM_IMAGE", d.tag())
            .arg("PYTHON_OPTIMIZE", d.python_optimize());
        self.engine.build_image(&request).await
    }

    /// コンポーネントの Dockerfile を適用する
    ///
    /// .dockerignore は書き換えないので、コンテキストは元の除外設定が
    /// 適用された components/ 全体になる。
    pub async fn build_specialized_image(&self, dockerfile: PathBuf) -> BuildResult<()> {
        let d = self.descriptor;
        info!(
            "Building specialized image for {} component (dockerfile={})",
            d.component,
            dockerfile.display()
        );

        let request = BuildRequest::new(DockerfileSource::Path(dockerfile), d.tag())
            .arg("FROM_IMAGE", d.tag())
            .arg("PYTHON_OPTIMIZE", d.python_optimize());
        self.engine.build_image(&request).await
    }

    /// イメージの Python バージョンと実行ユーザーを確定する
    ///
    /// component.yaml に指定があればそれを使い、なければ使い捨てイメージ内で
    /// 調べる。調査の失敗は警告にとどめてデフォルト値を使う。使い捨て
    /// イメージは必ず削除する。
    pub async fn inspect_image(&self) -> BuildResult<ResolvedImage> {
        let d = self.descriptor;
        let request = BuildRequest::new(self.template(Template::Lobotomize), PROBE_IMAGE)
            .arg("FROM_IMAGE", d.tag());
        self.engine.build_image(&request).await?;

        let language_version = self.resolve_language_version().await;
        let user = self.resolve_user().await;

        self.engine.remove_image(PROBE_IMAGE).await?;

        Ok(ResolvedImage {
            language_version,
            user,
        })
    }

    async fn resolve_language_version(&self) -> String {
        if let Some(version) = self.descriptor.config.language_version() {
            info!("Using configured python version: {}", version);
            return version;
        }

        match self.probe_language_version().await {
            Ok(version) => {
                info!("Extracted python version from base image: {}", version);
                version
            }
            Err(e) => {
                warn!("Failed to extract python version from base image: {}", e);
                self.descriptor.default_language_version.clone()
            }
        }
    }

    async fn probe_language_version(&self) -> BuildResult<String> {
        let version = self
            .engine
            .run_in_image(PROBE_IMAGE, PYTHON_VERSION_SCRIPT)
            .await?;

        if version.matches('.').count() != 2 {
            return Err(BuildError::UnexpectedProbeOutput(format!(
                "python version '{}'",
                version
            )));
        }
        Ok(version)
    }

    async fn resolve_user(&self) -> UserInfo {
        let configured = self.descriptor.config.user_info();
        if configured.is_complete() {
            info!("Using configured user info: {}", configured);
            return configured;
        }

        match self.probe_user().await {
            Ok(user) => {
                info!("Extracted user info from base image: {}", user);
                user
            }
            Err(e) => {
                warn!("Failed to extract user info from base image: {}", e);
                fallback_user()
            }
        }
    }

    async fn probe_user(&self) -> BuildResult<UserInfo> {
        let output = self
            .engine
            .run_in_image(PROBE_IMAGE, USER_INFO_SCRIPT)
            .await?;

        let lines: Vec<&str> = output.lines().map(str::trim).collect();
        let [name, groups, home] = lines.as_slice() else {
            return Err(BuildError::UnexpectedProbeOutput(format!(
                "user info '{}'",
                output
            )));
        };

        match groups.split_whitespace().next() {
            Some(group) if !name.is_empty() && !home.is_empty() => {
                Ok(UserInfo::new(*name, group, *home))
            }
            _ => Err(BuildError::UnexpectedProbeOutput(format!(
                "user info '{}'",
                output
            ))),
        }
    }

    /// poetry を追加する
    ///
    /// このイメージで pyproject.toml や poetry.lock を作成・更新できるようになる。
    pub async fn add_poetry(&mut self, resolved: &ResolvedImage) -> BuildResult<()> {
        let d = self.descriptor;
        info!("Adding poetry to {} component", d.component);

        let request = BuildRequest::new(self.template(Template::AddPoetry), d.tag())
            .arg("BUILDER_IMAGE", resolved.builder_image())
            .arg("FROM_IMAGE", d.tag())
            .arg("POETRY_VERSION", d.poetry_version.as_str())
            .arg("USER_HOME", resolved.user.home_dir())
            .arg("USER_CHOWN", resolved.user.chown());

        let mut ignore = self.dockerignore.scope()?;
        ignore.ignore_all()?;
        ignore.include("pip.conf")?;
        ignore.include("poetry.toml")?;
        ignore.ignore_defaults()?;

        self.engine.build_image(&request).await
    }

    /// component.yaml の dependencies をすべて追加する
    pub async fn add_dependencies(&mut self, resolved: &ResolvedImage) -> BuildResult<()> {
        for component in self.descriptor.dependencies() {
            self.add_component(resolved, &component).await?;
        }
        Ok(())
    }

    /// コンポーネントのライブラリとコード自体を追加する
    pub async fn add_component(
        &mut self,
        resolved: &ResolvedImage,
        component: &str,
    ) -> BuildResult<()> {
        info!(
            "Adding {} dependency to {} component",
            component, self.descriptor.component
        );

        if self.descriptor.has_python_dependencies(component) {
            self.add_component_python_dependencies(resolved, component)
                .await?;
        }
        self.add_component_content(component).await
    }

    /// コンポーネントの poetry 管理ライブラリをインストールする
    pub async fn add_component_python_dependencies(
        &mut self,
        resolved: &ResolvedImage,
        component: &str,
    ) -> BuildResult<()> {
        let d = self.descriptor;

        let request = BuildRequest::new(
            self.template(Template::AddComponentPythonDependencies),
            d.tag(),
        )
        .arg("BUILDER_IMAGE", resolved.builder_image())
        .arg("FROM_IMAGE", d.tag())
        .arg("COMPONENT", component)
        .arg("POETRY_VERSION", d.poetry_version.as_str())
        .arg("POETRY_NO_DEV", d.poetry_no_dev())
        .arg("PYTHON_OPTIMIZE", d.python_optimize())
        .arg("USER_HOME", resolved.user.home_dir())
        .arg("USER_CHOWN", resolved.user.chown());

        // poetry install に必要なファイルだけを残す
        let mut ignore = self.dockerignore.scope()?;
        ignore.ignore_all()?;
        ignore.include("pip.conf")?;
        ignore.include("poetry.toml")?;
        ignore.include(&format!("{}/pyproject.toml", component))?;
        ignore.include(&format!("{}/poetry.lock", component))?;

        self.engine.build_image(&request).await
    }

    /// コンポーネントのディレクトリだけをコンテキストに残してコードをコピーする
    pub async fn add_component_content(&mut self, component: &str) -> BuildResult<()> {
        let d = self.descriptor;

        let request = BuildRequest::new(self.template(Template::AddComponentContent), d.tag())
            .arg("FROM_IMAGE", d.tag())
            .arg("PYTHON_OPTIMIZE", d.python_optimize());

        let mut ignore = self.dockerignore.scope()?;
        ignore.ignore_all()?;
        ignore.include(component)?;
        ignore.ignore_defaults()?;

        self.engine.build_image(&request).await
    }
}
