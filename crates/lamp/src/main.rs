use clap::Parser;
use colored::Colorize;
use lamp_build::{DockerEngine, Orchestrator};
use lamp_core::{DEFAULT_POETRY_VERSION, DEFAULT_PYTHON_VERSION, LOCAL_HASH, Project, RunParameters};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lamp-build")]
#[command(version, about = "コンポーネントごとに Docker イメージをビルド", long_about = None)]
struct Cli {
    /// ビルドするコンポーネント（省略時は components/ 以下のすべて）
    components: Vec<String>,

    /// デプロイ先のクラスタ名
    #[arg(long, env = "CLUSTER_NAME")]
    cluster: String,

    /// ビルド識別子（"local" は開発ビルド）
    #[arg(long, env = "HASH", default_value = LOCAL_HASH)]
    hash: String,

    /// プロジェクトルート（省略時は lamp.json を上位ディレクトリへ探索）
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// component.yaml で指定がない場合の Python バージョン
    #[arg(long, default_value = DEFAULT_PYTHON_VERSION)]
    python_version: String,

    /// インストールする poetry のバージョン
    #[arg(long, default_value = DEFAULT_POETRY_VERSION)]
    poetry_version: String,

    /// docker build の出力を含むデバッグログを表示
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match cli.project_root {
        Some(root) => root,
        None => lamp_core::find_project_root()?,
    };
    let project = Project::load(&root)?;

    let params = RunParameters {
        cluster: cli.cluster,
        hash: cli.hash,
        default_language_version: cli.python_version,
        poetry_version: cli.poetry_version,
    };
    tracing::info!(
        project = %project.name(),
        cluster = %params.cluster,
        hash = %params.hash,
        "Building component images"
    );

    let engine =
        DockerEngine::connect(project.components_dir()).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let mut orchestrator = Orchestrator::new(engine, project, params);

    // Ctrl-C ではビルドの future を drop して .dockerignore を復元させる
    let built = tokio::select! {
        result = orchestrator.build(&cli.components) => {
            result.map_err(|e| anyhow::anyhow!(e.user_message()))?
        }
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("ビルドが中断されました");
        }
    };

    println!(
        "{} {}",
        "✓".green(),
        format!("Built images for components: {}", built.join(", "))
            .green()
            .bold()
    );
    Ok(())
}
