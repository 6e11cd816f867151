//! `docker` CLI の呼び出し
//!
//! ビルドは Docker API ではなく `docker build` で行う。CLI はビルドのたびに
//! `.dockerignore` をディスクから読むため、[`crate::dockerignore`] による
//! 書き換えがそのままビルドコンテキストに反映される。

use crate::engine::BuildRequest;
use crate::error::{BuildError, BuildResult};
use crate::template::DockerfileSource;
use lamp_core::project::DOCKERIGNORE_FILE;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::debug;

/// 外部コマンドの出力をログに揃えるためのインデント
pub(crate) const OUTPUT_INDENT: usize = 9;

pub(crate) fn indent(text: &str, width: usize) -> String {
    let prefix = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 子プロセスの出力を 1 行ずつインデントして debug ログに流す
///
/// 出力は UTF-8 とは限らないので、行ごとに不正なバイトを置換して扱う。
async fn forward_output<R>(reader: Option<R>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };

    let prefix = " ".repeat(OUTPUT_INDENT);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&line);
        debug!("{}{}", prefix, text.trim_end_matches(['\n', '\r']));
    }
}

/// 埋め込みテンプレートを標準入力に書き込んで閉じる
///
/// docker が先に終了して標準入力を閉じた場合は、終了ステータスで
/// 失敗を報告するためここではエラーにしない。
async fn feed_stdin(stdin: Option<ChildStdin>, content: Option<&str>) -> io::Result<()> {
    let (Some(mut stdin), Some(content)) = (stdin, content) else {
        return Ok(());
    };

    match stdin.write_all(content.as_bytes()).await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("docker closed stdin before reading the dockerfile");
            Ok(())
        }
        result => result,
    }
}

/// `docker` コマンド
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
    context_dir: PathBuf,
}

impl DockerCli {
    /// PATH 上の `docker` を使う
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self::with_program("docker", context_dir)
    }

    pub fn with_program(program: impl Into<PathBuf>, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            context_dir: context_dir.into(),
        }
    }

    fn build_command(&self, request: &BuildRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("build");

        for (key, value) in &request.build_args {
            cmd.arg("--build-arg").arg(format!("{}={}", key, value));
        }

        cmd.arg("--tag").arg(&request.tag).arg("-f");
        match &request.dockerfile {
            DockerfileSource::Path(path) => cmd.arg(path),
            // 埋め込みテンプレートは標準入力から渡す
            DockerfileSource::Embedded(_) => cmd.arg("-"),
        };
        cmd.arg(&self.context_dir);
        cmd
    }

    /// 読みやすい形でビルドコマンドと .dockerignore をログに出す
    fn log_build(&self, request: &BuildRequest) {
        let args = request
            .build_args
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            "docker build --tag {} -f {} {}\n{}\n",
            request.tag,
            request.dockerfile,
            self.context_dir.display(),
            indent(&args, 13)
        );

        if let Ok(content) = std::fs::read_to_string(self.context_dir.join(DOCKERIGNORE_FILE)) {
            debug!(
                ".dockerignore file:\n{}================================\n{}",
                " ".repeat(OUTPUT_INDENT),
                indent(&content, OUTPUT_INDENT)
            );
        }
    }

    /// `docker build` を実行し、出力を debug ログに流す
    pub async fn build(&self, request: &BuildRequest) -> BuildResult<()> {
        self.log_build(request);

        let embedded = match &request.dockerfile {
            DockerfileSource::Embedded(template) => Some(template.embedded()),
            DockerfileSource::Path(_) => None,
        };

        let mut cmd = self.build_command(request);
        cmd.stdin(if embedded.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // 中断時にビルドを残さない
        .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        debug!("Docker build output:");
        let (written, stdout, stderr) = tokio::join!(
            feed_stdin(child.stdin.take(), embedded),
            forward_output(child.stdout.take()),
            forward_output(child.stderr.take())
        );

        let status = child.wait().await?;
        if !status.success() {
            return Err(BuildError::CommandFailed {
                command: format!("docker build --tag {}", request.tag),
                status: status.to_string(),
            });
        }

        written?;
        stdout?;
        stderr?;
        Ok(())
    }

    /// `docker run --rm IMAGE /bin/sh -c SCRIPT` の標準出力を返す
    pub async fn run(&self, image: &str, script: &str) -> BuildResult<String> {
        let output = Command::new(&self.program)
            .args(["run", "--rm", image, "/bin/sh", "-c", script])
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{}", indent(stderr.trim_end(), OUTPUT_INDENT));
        }

        if !output.status.success() {
            return Err(BuildError::CommandFailed {
                command: format!("docker run --rm {} /bin/sh -c {:?}", image, script),
                status: output.status.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
