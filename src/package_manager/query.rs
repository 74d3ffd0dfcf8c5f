//! 只读的包数据库查询（dpkg -l）

use super::parser::has_installed_marker;
use super::types::QueryError;
use crate::config::Config;
use std::io;

/// 查询某个包是否已安装，只调用只读工具
#[cfg_attr(test, mockall::automock)]
pub trait PackageQuery: Send + Sync {
    fn is_installed(&self, name: &str) -> Result<bool, QueryError>;
}

#[derive(Debug, Clone)]
pub struct DpkgQuery {
    tool: String,
    args: Vec<String>,
    marker: String,
}

impl DpkgQuery {
    pub fn new(tool: &str, args: &[&str], marker: &str) -> Self {
        Self {
            tool: tool.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            marker: marker.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            tool: config.query_tool.clone(),
            args: config.query_args.clone(),
            marker: config.installed_marker.clone(),
        }
    }
}

impl PackageQuery for DpkgQuery {
    fn is_installed(&self, name: &str) -> Result<bool, QueryError> {
        let mut args = self.args.clone();
        args.push(name.to_string());

        let output = duct::cmd(self.tool.as_str(), &args)
            .stdin_null()
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => QueryError::ToolMissing(self.tool.clone()),
                _ => QueryError::Inconclusive(e.to_string()),
            })?;

        // dpkg -l 对未知包返回非零，这是“未安装”而不是错误
        if !output.status.success() {
            return Ok(false);
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(has_installed_marker(&listing, &self.marker, name))
    }
}
