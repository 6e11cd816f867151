use async_trait::async_trait;
use lamp_build::{
    BuildError, BuildRequest, BuildResult, DockerfileSource, ImageEngine, Orchestrator, Template,
};
use lamp_core::{Project, RunParameters};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ORIGINAL_DOCKERIGNORE: &str = "**/__pycache__\n**/*.pyc\n.venv\n";

/// エンジンが受け取った呼び出し
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ImageExists(String),
    Pull(String),
    Tag { source: String, target: String },
    /// ビルド時点の .dockerignore の内容も記録する
    Build {
        request: BuildRequest,
        dockerignore: String,
    },
    Run { image: String, script: String },
    Remove(String),
}

#[derive(Debug)]
struct State {
    calls: Vec<Call>,
    dockerignore: PathBuf,
    python_version: Option<String>,
    user_info: Option<String>,
    missing_images: Vec<String>,
    fail_on: Option<Template>,
    hang_on: Option<Template>,
}

/// Docker を使わずに呼び出しを記録するエンジン
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    state: Arc<Mutex<State>>,
}

impl RecordingEngine {
    pub fn new(dockerignore: &Path) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                calls: Vec::new(),
                dockerignore: dockerignore.to_path_buf(),
                python_version: Some("3.8.2".to_string()),
                user_info: Some("aladdin-user\naladdin-user users\n/home/aladdin-user".to_string()),
                missing_images: Vec::new(),
                fail_on: None,
                hang_on: None,
            })),
        }
    }

    pub fn with_probe_output(self, python_version: Option<&str>, user_info: Option<&str>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.python_version = python_version.map(str::to_string);
            state.user_info = user_info.map(str::to_string);
        }
        self
    }

    pub fn with_missing_image(self, image: &str) -> Self {
        self.state.lock().unwrap().missing_images.push(image.to_string());
        self
    }

    pub fn failing_on(self, template: Template) -> Self {
        self.state.lock().unwrap().fail_on = Some(template);
        self
    }

    /// 指定したテンプレートのビルドが完了しないようにする
    pub fn hanging_on(self, template: Template) -> Self {
        self.state.lock().unwrap().hang_on = Some(template);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// ビルドされたリクエストと、その時点の .dockerignore
    pub fn builds(&self) -> Vec<(BuildRequest, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Build {
                    request,
                    dockerignore,
                } => Some((request, dockerignore)),
                _ => None,
            })
            .collect()
    }

    pub fn built_templates(&self) -> Vec<Option<Template>> {
        self.builds()
            .into_iter()
            .map(|(request, _)| match request.dockerfile {
                DockerfileSource::Embedded(template) => Some(template),
                DockerfileSource::Path(_) => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn command_failed(command: &str) -> BuildError {
    BuildError::CommandFailed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
    }
}

#[async_trait]
impl ImageEngine for RecordingEngine {
    async fn image_exists(&self, image: &str) -> BuildResult<bool> {
        self.record(Call::ImageExists(image.to_string()));
        let state = self.state.lock().unwrap();
        Ok(!state.missing_images.iter().any(|i| i == image))
    }

    async fn pull_image(&self, image: &str) -> BuildResult<()> {
        self.record(Call::Pull(image.to_string()));
        Ok(())
    }

    async fn tag_image(&self, source: &str, target: &str) -> BuildResult<()> {
        self.record(Call::Tag {
            source: source.to_string(),
            target: target.to_string(),
        });
        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> BuildResult<()> {
        let (path, fail_on, hang_on) = {
            let state = self.state.lock().unwrap();
            (state.dockerignore.clone(), state.fail_on, state.hang_on)
        };
        let dockerignore = fs::read_to_string(path).unwrap_or_default();
        self.record(Call::Build {
            request: request.clone(),
            dockerignore,
        });

        if let DockerfileSource::Embedded(template) = &request.dockerfile
            && hang_on == Some(*template)
        {
            std::future::pending::<()>().await;
        }

        match (&request.dockerfile, fail_on) {
            (DockerfileSource::Embedded(template), Some(failing)) if *template == failing => {
                Err(command_failed("docker build"))
            }
            _ => Ok(()),
        }
    }

    async fn run_in_image(&self, image: &str, script: &str) -> BuildResult<String> {
        self.record(Call::Run {
            image: image.to_string(),
            script: script.to_string(),
        });

        let state = self.state.lock().unwrap();
        let output = if script.contains("platform") {
            state.python_version.clone()
        } else {
            state.user_info.clone()
        };
        output.ok_or_else(|| command_failed("docker run"))
    }

    async fn remove_image(&self, image: &str) -> BuildResult<()> {
        self.record(Call::Remove(image.to_string()));
        Ok(())
    }
}

/// テスト用のプロジェクトディレクトリ
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("lamp.json"),
            r#"{"name": "demo", "docker_images": ["api"]}"#,
        )
        .unwrap();
        fs::create_dir_all(root.path().join("components")).unwrap();
        fs::write(
            root.path().join("components/.dockerignore"),
            ORIGINAL_DOCKERIGNORE,
        )
        .unwrap();
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn dockerignore_path(&self) -> PathBuf {
        self.path().join("components/.dockerignore")
    }

    pub fn dockerignore(&self) -> String {
        fs::read_to_string(self.dockerignore_path()).unwrap()
    }

    pub fn add_component(&self, name: &str, config: Option<&str>) -> &Self {
        let dir = self.path().join("components").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__init__.py"), "").unwrap();
        if let Some(config) = config {
            fs::write(dir.join("component.yaml"), config).unwrap();
        }
        self
    }

    pub fn write_file(&self, component: &str, file: &str, content: &str) -> &Self {
        fs::write(self.path().join("components").join(component).join(file), content).unwrap();
        self
    }

    pub fn engine(&self) -> RecordingEngine {
        RecordingEngine::new(&self.dockerignore_path())
    }

    pub fn orchestrator(
        &self,
        engine: RecordingEngine,
        cluster: &str,
        hash: &str,
    ) -> Orchestrator<RecordingEngine> {
        let project = Project::load(self.path()).unwrap();
        Orchestrator::new(engine, project, RunParameters::new(cluster, hash))
    }
}
