//! .dockerignore の一時書き換え
//!
//! すべてのビルドステップは同じ `components/` をコンテキストとして送るが、
//! ステップごとに見せるファイルを絞り込む。docker はビルド中に
//! `.dockerignore` をディスクから読むため、ファイル自体を書き換え、
//! スコープを抜けるときに元の内容へ戻す。
//!
//! [`DockerIgnoreFile::scope`] は `&mut self` を取るので、同時に存在できる
//! スコープは常に 1 つだけ。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// プロジェクトに 1 つだけ存在する .dockerignore
#[derive(Debug)]
pub struct DockerIgnoreFile {
    path: PathBuf,
}

impl DockerIgnoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 元の内容を退避してファイルを空にし、書き換えスコープを開始する
    ///
    /// 返されたガードが drop されると、成功・エラー・panic のいずれでも
    /// 元の内容がバイト単位で復元される。
    pub fn scope(&mut self) -> io::Result<DockerIgnore<'_>> {
        let (snapshot, original) = if self.path.exists() {
            let snapshot = NamedTempFile::new()?;
            fs::copy(&self.path, snapshot.path())?;
            let original = fs::read(snapshot.path())?;
            (Some(snapshot), original)
        } else {
            (None, Vec::new())
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        let mut ignore = DockerIgnore {
            owner: self,
            file,
            original,
            snapshot,
        };

        ignore.write("")?;
        ignore.write("### Ephemeral modifications ###")?;
        ignore.write("# Specific instructions")?;
        Ok(ignore)
    }
}

/// 書き換え中の .dockerignore
#[derive(Debug)]
pub struct DockerIgnore<'a> {
    owner: &'a mut DockerIgnoreFile,
    file: File,
    original: Vec<u8>,
    snapshot: Option<NamedTempFile>,
}

impl DockerIgnore<'_> {
    /// コンテキスト全体を除外する。以降の `include` で許可リストを作る
    pub fn ignore_all(&mut self) -> io::Result<()> {
        self.ignore("**")
    }

    /// 元の .dockerignore の内容をそのまま追記する
    pub fn ignore_defaults(&mut self) -> io::Result<()> {
        self.write("")?;
        self.write("### Original content ###")?;
        self.file.write_all(&self.original)?;
        self.write("")
    }

    pub fn ignore(&mut self, entry: &str) -> io::Result<()> {
        self.write(entry)
    }

    pub fn include(&mut self, entry: &str) -> io::Result<()> {
        self.write(&format!("!{}", entry))
    }

    pub fn write(&mut self, entry: &str) -> io::Result<()> {
        writeln!(self.file, "{}", entry)?;
        self.file.flush()
    }

    fn restore(&self) -> io::Result<()> {
        match &self.snapshot {
            Some(snapshot) => {
                fs::copy(snapshot.path(), self.owner.path())?;
            }
            // 元々存在しなかった
            None => fs::remove_file(self.owner.path())?,
        }
        Ok(())
    }
}

impl Drop for DockerIgnore<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(
                path = %self.owner.path().display(),
                "Failed to restore .dockerignore: {}",
                e
            );
        }
    }
}
