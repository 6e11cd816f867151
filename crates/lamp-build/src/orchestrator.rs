//! コンポーネントのビルド全体を制御する
//!
//! コンポーネントは 1 つずつ順番にビルドする。ステップ間で共有する
//! .dockerignore とイメージタグがあるため並列化はしない。

use crate::dockerignore::DockerIgnoreFile;
use crate::engine::{BuildRequest, ImageEngine};
use crate::error::BuildResult;
use crate::steps::ComponentBuilder;
use crate::template::Template;
use lamp_core::{BuildDescriptor, Project, RunParameters, load_component_config};
use tracing::{error, info};

/// 対象クラスタ向けにビルドしないコンポーネントのイメージに表示するメッセージ
pub fn placeholder_message(component: &str) -> String {
    format!(
        "\nThis image was published but is not meant to be run in this environment.\n\
         \n\
         If you're seeing this, you probably need to add this cluster to the\n\
         clusters list in the components/{}/component.yaml file.\n",
        component
    )
}

pub struct Orchestrator<E: ImageEngine> {
    engine: E,
    project: Project,
    params: RunParameters,
    dockerignore: DockerIgnoreFile,
}

impl<E: ImageEngine> Orchestrator<E> {
    pub fn new(engine: E, project: Project, params: RunParameters) -> Self {
        let dockerignore = DockerIgnoreFile::new(project.dockerignore_path());
        Self {
            engine,
            project,
            params,
            dockerignore,
        }
    }

    /// 各コンポーネントのイメージをビルドする
    ///
    /// `components` が空なら components/ 以下のディレクトリをすべてビルドする。
    /// 最初に失敗したコンポーネントで中断する。
    pub async fn build(&mut self, components: &[String]) -> BuildResult<Vec<String>> {
        let components = if components.is_empty() {
            self.project.discover_components()?
        } else {
            components.to_vec()
        };

        for component in &components {
            self.build_component(component).await?;
        }

        info!("Built images for components: {}", components.join(", "));
        Ok(components)
    }

    async fn build_component(&mut self, component: &str) -> BuildResult<()> {
        let config = load_component_config(&self.project.components_dir(), component)?;
        let descriptor = BuildDescriptor::new(&self.project, component, config, &self.params);

        // 開発用コンポーネントを誤ってクラスタに公開・デプロイしないための確認
        if !descriptor
            .config
            .should_build_for_cluster(&self.params.cluster)
        {
            info!(
                "Not building {} component due to '{}' not being in the cluster whitelist",
                component, self.params.cluster
            );
            return self.build_placeholder_image(&descriptor).await;
        }

        descriptor.check_language()?;

        info!("Building image for component: {}", component);
        if descriptor.published() {
            info!("{} is listed in docker_images and will be published", component);
        }

        let mut builder = ComponentBuilder::new(
            &self.engine,
            &descriptor,
            &mut self.dockerignore,
            &self.project.root,
        );

        match builder.build().await {
            Ok(resolved) => {
                info!(
                    python_version = %resolved.language_version,
                    user = %resolved.user,
                    "Built image for component: {}",
                    component
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to build image for component: {}", component);
                Err(e)
            }
        }
    }

    /// 期待されたイメージがビルドされなかった理由を表示するだけのイメージ
    async fn build_placeholder_image(&self, descriptor: &BuildDescriptor) -> BuildResult<()> {
        let request = BuildRequest::new(
            Template::EchoMessage.resolve(&self.project.root),
            descriptor.tag(),
        )
        .arg("MESSAGE", placeholder_message(&descriptor.component));
        self.engine.build_image(&request).await
    }
}
