//! 包管理器模块：对 pkexec + apt / apt-fast 的封装

pub mod parser;
pub mod status;
pub mod query;
pub mod repository;
pub mod runner;
pub mod types;

// 重新导出常用类型
pub use status::StatusChecker;
pub use query::{DpkgQuery, PackageQuery};
pub use repository::RepositoryEnsurer;
pub use runner::{Launch, LineSink, PrivilegedRunner, ProcessHandle};
pub use types::{Exit, QueryError, RunOutput, RunnerError};

use crate::config::Config;
use std::process::Command;

/// 选择包管理器时需要的配置
#[derive(Debug, Clone)]
pub struct ToolSet {
    pub elevator: String,
    pub standard: String,
    pub fast: String,
}

impl ToolSet {
    pub fn from_config(config: &Config) -> Self {
        Self {
            elevator: config.elevator.clone(),
            standard: config.package_tool.clone(),
            fast: config.fast_package_tool.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageManager {
    pub elevator: String,
    pub command: String,
}

impl PackageManager {
    pub fn new(elevator: &str, command: &str) -> Self {
        Self {
            elevator: elevator.to_string(),
            command: command.to_string(),
        }
    }

    /// 按优先级检测: 加速版 -> 标准版
    pub fn detect(tools: &ToolSet) -> Self {
        let command = if !tools.fast.is_empty() && is_available(&tools.fast) {
            tools.fast.clone()
        } else {
            tools.standard.clone()
        };
        log::debug!("使用包管理器 {}", command);
        Self {
            elevator: tools.elevator.clone(),
            command,
        }
    }

    pub fn name(&self) -> &str {
        &self.command
    }

    pub fn install_command(&self, targets: &[String]) -> Vec<String> {
        let mut argv = self.base(&["install", "-y"]);
        argv.extend(targets.iter().cloned());
        argv
    }

    pub fn remove_command(&self, targets: &[String]) -> Vec<String> {
        let mut argv = self.base(&["remove", "-y"]);
        argv.extend(targets.iter().cloned());
        argv
    }

    /// 只刷新软件包元数据
    pub fn update_command(&self) -> Vec<String> {
        self.base(&["update"])
    }

    fn base(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::new();
        if !self.elevator.is_empty() {
            argv.push(self.elevator.clone());
        }
        argv.push(self.command.clone());
        argv.extend(args.iter().map(|s| s.to_string()));
        argv
    }
}

fn is_available(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_composition() {
        let pm = PackageManager::new("pkexec", "apt-fast");
        assert_eq!(
            pm.install_command(&strings(&["wine", "q4wine", "winetricks"])),
            strings(&["pkexec", "apt-fast", "install", "-y", "wine", "q4wine", "winetricks"])
        );
        assert_eq!(
            pm.remove_command(&strings(&["firefox"])),
            strings(&["pkexec", "apt-fast", "remove", "-y", "firefox"])
        );
        assert_eq!(pm.update_command(), strings(&["pkexec", "apt-fast", "update"]));
    }

    #[test]
    fn test_empty_elevator_runs_tool_directly() {
        let pm = PackageManager::new("", "apt");
        assert_eq!(pm.update_command(), strings(&["apt", "update"]));
    }

    #[test]
    fn test_detect_falls_back_to_standard_tool() {
        let tools = ToolSet {
            elevator: "pkexec".to_string(),
            standard: "apt".to_string(),
            fast: "pkgtoken-no-such-apt-fast".to_string(),
        };
        let pm = PackageManager::detect(&tools);
        assert_eq!(pm.name(), "apt");
        assert_eq!(pm.elevator, "pkexec");
    }

    #[test]
    fn test_detect_prefers_fast_tool_when_present() {
        let tools = ToolSet {
            elevator: String::new(),
            standard: "apt".to_string(),
            fast: "sh".to_string(),
        };
        assert_eq!(PackageManager::detect(&tools).name(), "sh");
    }
}
