//! PackageManager 相关数据类型定义

use std::io;
use thiserror::Error;

/// 子进程的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    /// 非零退出码；被信号终止时为 None
    Code(Option<i32>),
    Cancelled,
}

/// 命令输出结果
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: Exit,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit == Exit::Success
    }

    /// 把非零退出码转换为 `RunnerError::ExitNonZero`，附带最后一行有效输出
    pub fn check(self) -> Result<RunOutput, RunnerError> {
        match self.exit {
            Exit::Code(code) => Err(RunnerError::ExitNonZero {
                code,
                detail: super::parser::failure_detail(&self.stdout, &self.stderr),
            }),
            _ => Ok(self),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("命令不能为空")]
    EmptyCommand,

    #[error("无法启动 {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("命令执行失败（{}）{}", describe_code(.code), describe_detail(.detail))]
    ExitNonZero { code: Option<i32>, detail: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("退出码 {}", code),
        None => "被信号终止".to_string(),
    }
}

fn describe_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

/// 包数据库查询失败；在探测边界被吸收为“未安装”
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("查询工具不存在: {0}")]
    ToolMissing(String),

    #[error("查询结果无法判断: {0}")]
    Inconclusive(String),
}
