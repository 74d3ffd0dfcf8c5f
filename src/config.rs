use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 提权工具，留空则直接运行包管理器
    pub elevator: String,
    pub package_tool: String,
    /// 加速版包管理器，检测到存在时优先使用
    pub fast_package_tool: String,
    pub query_tool: String,
    pub query_args: Vec<String>,
    /// 查询输出中表示“已安装”的状态标记（dpkg 为 ii）
    pub installed_marker: String,
    /// 取消时 SIGTERM 与 SIGKILL 之间的宽限期（毫秒）
    pub cancel_grace_ms: u64,
    /// 外部软件目录文件，未设置时使用内置目录
    pub catalogue: Option<PathBuf>,
    /// TUI 运行期间日志写入的文件，未设置时使用 ~/.cache/pkgtoken/pkgtoken.log
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elevator: "pkexec".to_string(),
            package_tool: "apt".to_string(),
            fast_package_tool: "apt-fast".to_string(),
            query_tool: "dpkg".to_string(),
            query_args: vec!["-l".to_string()],
            installed_marker: "ii".to_string(),
            cancel_grace_ms: 2000,
            catalogue: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        home_dir().join(".config/pkgtoken/config.toml")
    }

    /// TUI 占用终端，日志总是写入文件；未配置时放在缓存目录
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| home_dir().join(".cache/pkgtoken/pkgtoken.log"))
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let config = Config::from_toml("package_tool = \"apt-get\"\n").unwrap();
        assert_eq!(config.package_tool, "apt-get");
        assert_eq!(config.elevator, "pkexec");
        assert_eq!(config.installed_marker, "ii");
        assert_eq!(config.cancel_grace(), Duration::from_secs(2));
        assert!(config.catalogue.is_none());
    }

    #[test]
    fn test_empty_elevator_and_catalogue_path() {
        let config = Config::from_toml(
            "elevator = \"\"\ncatalogue = \"/etc/pkgtoken/catalogue.toml\"\ncancel_grace_ms = 500\n",
        )
        .unwrap();
        assert!(config.elevator.is_empty());
        assert_eq!(
            config.catalogue,
            Some(PathBuf::from("/etc/pkgtoken/catalogue.toml"))
        );
        assert_eq!(config.cancel_grace(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("cancel_grace_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_log_path_defaults_to_cache_dir() {
        let config = Config::default();
        assert!(config
            .log_path()
            .ends_with(".cache/pkgtoken/pkgtoken.log"));

        let config = Config::from_toml("log_file = \"/tmp/pkgtoken-test.log\"\n").unwrap();
        assert_eq!(config.log_path(), PathBuf::from("/tmp/pkgtoken-test.log"));
    }

    #[test]
    fn test_huge_cancel_grace_is_accepted() {
        let config = Config::from_toml("cancel_grace_ms = 9223372036854775807\n").unwrap();
        let runner = crate::package_manager::PrivilegedRunner::new(config.cancel_grace());
        assert_eq!(runner.grace(), crate::package_manager::runner::MAX_GRACE);
    }
}
