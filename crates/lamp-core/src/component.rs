//! コンポーネント設定 (component.yaml)
//!
//! `components/<name>/component.yaml` をドット区切りのパスで参照できる
//! 読み取り専用ビューとして扱います。未指定 (`Undefined`) と明示的な
//! `null` を区別するため、参照結果は [`Setting`] で返します。

use crate::error::{ConfigError, Result};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// コンポーネント設定ファイル名
pub const COMPONENT_CONFIG_FILE: &str = "component.yaml";

/// ドット区切りパスの参照結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting<'a> {
    /// キーが存在しない
    Undefined,
    /// キーは存在するが値が `null`
    Null,
    /// 値が存在する
    Value(&'a Value),
}

impl<'a> Setting<'a> {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Setting::Undefined)
    }

    pub fn value(self) -> Option<&'a Value> {
        match self {
            Setting::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(self) -> Option<&'a str> {
        self.value().and_then(Value::as_str)
    }

    pub fn as_bool(self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    pub fn as_string_list(self) -> Option<Vec<String>> {
        self.value()?
            .as_sequence()?
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect()
    }
}

/// イメージの実行ユーザー情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: Option<String>,
    pub group: Option<String>,
    pub home: Option<String>,
}

impl UserInfo {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        home: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            group: Some(group.into()),
            home: Some(home.into()),
        }
    }

    /// 3 つのフィールドすべてが設定されているか
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.group.is_some() && self.home.is_some()
    }

    /// `chown` 用の `user:group` 表記
    pub fn chown(&self) -> String {
        format!(
            "{}:{}",
            self.name.as_deref().unwrap_or_default(),
            self.group.as_deref().unwrap_or_default()
        )
    }

    pub fn home_dir(&self) -> &str {
        self.home.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} group={} home={}",
            self.name.as_deref().unwrap_or("-"),
            self.group.as_deref().unwrap_or("-"),
            self.home.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Expected {
    Mapping,
    Integer,
    String,
    StringOrNumber,
    Bool,
    StringList,
}

impl Expected {
    fn matches(self, value: &Value) -> bool {
        match self {
            Expected::Mapping => value.is_mapping(),
            Expected::Integer => value.is_i64() || value.is_u64(),
            Expected::String => value.is_string(),
            Expected::StringOrNumber => value.is_string() || value.is_number(),
            Expected::Bool => value.is_bool(),
            Expected::StringList => value
                .as_sequence()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Expected::Mapping => "a mapping",
            Expected::Integer => "an integer",
            Expected::String => "a string",
            Expected::StringOrNumber => "a string or a number",
            Expected::Bool => "a boolean",
            Expected::StringList => "a list of strings",
        }
    }
}

/// 認識するキーと期待する型。セクションは子キーより先に並べる。
const SCHEMA: &[(&str, Expected)] = &[
    ("meta", Expected::Mapping),
    ("meta.version", Expected::Integer),
    ("language", Expected::Mapping),
    ("language.name", Expected::String),
    ("language.version", Expected::StringOrNumber),
    ("clusters", Expected::StringList),
    ("image", Expected::Mapping),
    ("image.base", Expected::String),
    ("image.aladdinize", Expected::Bool),
    ("image.add_poetry", Expected::Bool),
    ("dependencies", Expected::StringList),
    ("user", Expected::Mapping),
    ("user.name", Expected::String),
    ("user.group", Expected::String),
    ("user.home", Expected::String),
];

/// component.yaml の読み取り専用ビュー
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    data: Value,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            data: Value::Mapping(Mapping::new()),
        }
    }
}

impl ComponentConfig {
    /// パース済みドキュメントから設定を作成し、構造を検証する
    pub fn from_value(data: Value) -> Result<Self> {
        let data = match data {
            // 空のドキュメント
            Value::Null => return Ok(Self::default()),
            Value::Mapping(_) => data,
            _ => {
                return Err(ConfigError::InvalidComponentConfig {
                    key: "(root)".to_string(),
                    expected: Expected::Mapping.describe(),
                });
            }
        };

        let config = Self { data };
        config.validate()?;
        Ok(config)
    }

    /// YAML 文字列から設定を作成する
    ///
    /// 構文エラーは [`ConfigError::ComponentConfigSyntax`]、型の誤りは
    /// [`ConfigError::InvalidComponentConfig`] になる。
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    fn validate(&self) -> Result<()> {
        for (key, expected) in SCHEMA {
            if let Setting::Value(value) = self.get(key)
                && !expected.matches(value)
            {
                return Err(ConfigError::InvalidComponentConfig {
                    key: key.to_string(),
                    expected: expected.describe(),
                });
            }
        }
        Ok(())
    }

    /// ドット区切りのパスで値を参照する。存在しないキーでも失敗しない。
    pub fn get(&self, path: &str) -> Setting<'_> {
        let mut current = &self.data;
        for key in path.split('.') {
            match current {
                Value::Mapping(mapping) => match mapping.get(key) {
                    Some(value) => current = value,
                    None => return Setting::Undefined,
                },
                _ => return Setting::Undefined,
            }
        }

        if current.is_null() {
            Setting::Null
        } else {
            Setting::Value(current)
        }
    }

    /// `clusters` が未指定、またはクラスタを含む場合に true
    pub fn should_build_for_cluster(&self, cluster: &str) -> bool {
        match self.clusters() {
            None => true,
            Some(clusters) => clusters.iter().any(|c| c == cluster),
        }
    }

    pub fn version(&self) -> u64 {
        self.get("meta.version")
            .value()
            .and_then(Value::as_u64)
            .unwrap_or(1)
    }

    pub fn language_name(&self) -> Option<String> {
        self.get("language.name")
            .as_str()
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase)
    }

    /// 数値で書かれたバージョンも文字列として扱う
    pub fn language_version(&self) -> Option<String> {
        match self.get("language.version").value()? {
            Value::String(version) if !version.is_empty() => Some(version.clone()),
            Value::Number(version) => Some(version.to_string()),
            _ => None,
        }
    }

    /// `None` はすべてのクラスタ向けにビルドすることを意味する
    pub fn clusters(&self) -> Option<Vec<String>> {
        self.get("clusters").as_string_list()
    }

    pub fn image_base(&self) -> Option<&str> {
        self.get("image.base").as_str().filter(|base| !base.is_empty())
    }

    /// 未指定なら `None`。明示的な `null` は無効化として `Some(false)`
    pub fn image_aladdinize(&self) -> Option<bool> {
        Self::flag(self.get("image.aladdinize"))
    }

    /// 未指定なら `None`。明示的な `null` は無効化として `Some(false)`
    pub fn image_add_poetry(&self) -> Option<bool> {
        Self::flag(self.get("image.add_poetry"))
    }

    fn flag(setting: Setting<'_>) -> Option<bool> {
        match setting {
            Setting::Undefined => None,
            Setting::Null => Some(false),
            Setting::Value(value) => Some(value.as_bool().unwrap_or(false)),
        }
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.get("dependencies")
            .as_string_list()
            .unwrap_or_default()
    }

    pub fn user_info(&self) -> UserInfo {
        let field = |key: &str| self.get(key).as_str().map(str::to_string);
        UserInfo {
            name: field("user.name"),
            group: field("user.group"),
            home: field("user.home"),
        }
    }
}

/// コンポーネントの component.yaml を読み込む
///
/// ファイルが存在しない、または YAML として読めない場合は空の設定を返す。
/// 構造の検証エラーだけは呼び出し元に伝播する。
pub fn load_component_config(components_dir: &Path, component: &str) -> Result<ComponentConfig> {
    let path = components_dir.join(component).join(COMPONENT_CONFIG_FILE);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No component config, using defaults");
            return Ok(ComponentConfig::default());
        }
    };

    match ComponentConfig::from_yaml_str(&content) {
        Err(ConfigError::ComponentConfigSyntax(e)) => {
            warn!(path = %path.display(), error = %e, "Unparseable component config, using defaults");
            Ok(ComponentConfig::default())
        }
        result => result.inspect_err(|e| {
            tracing::error!(path = %path.display(), "Invalid component config: {}", e);
        }),
    }
}
