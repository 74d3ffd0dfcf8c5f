//! 操作请求、结果、观察者接口，以及工作线程发回事件循环的消息

use crate::catalogue::{EntryId, PackageEntry};
use std::fmt;

pub type OperationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    InstallAlternate,
    Remove,
    SystemUpdate,
}

impl Action {
    pub fn verb(self) -> Verb {
        match self {
            Action::Install | Action::InstallAlternate => Verb::Install,
            Action::Remove => Verb::Remove,
            Action::SystemUpdate => Verb::Update,
        }
    }

    pub fn is_install(self) -> bool {
        self.verb() == Verb::Install
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Install,
    Remove,
    Update,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Install => "安装",
            Verb::Remove => "卸载",
            Verb::Update => "更新",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub action: Action,
    /// SystemUpdate 没有目标条目
    pub entry: Option<EntryId>,
}

impl OperationRequest {
    pub fn install(entry: EntryId) -> Self {
        Self {
            action: Action::Install,
            entry: Some(entry),
        }
    }

    pub fn install_alternate(entry: EntryId) -> Self {
        Self {
            action: Action::InstallAlternate,
            entry: Some(entry),
        }
    }

    pub fn remove(entry: EntryId) -> Self {
        Self {
            action: Action::Remove,
            entry: Some(entry),
        }
    }

    pub fn system_update() -> Self {
        Self {
            action: Action::SystemUpdate,
            entry: None,
        }
    }
}

/// `request` 的结果。`Busy` 是静默拒绝：不排队、不通知观察者
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(OperationId),
    Busy,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Success,
    Failure(String),
    Cancelled,
}

/// UI 适配层实现的回调，全部在事件循环上下文中调用
pub trait SupervisorObserver {
    fn on_operation_started(&mut self, entry: &PackageEntry, verb: Verb);
    fn on_operation_finished(&mut self, entry: &PackageEntry, verb: Verb, result: &OperationResult);
    fn on_status_resolved(&mut self, entry: &PackageEntry, installed: bool);
    fn on_system_update_started(&mut self);
    fn on_system_update_finished(&mut self, result: &OperationResult);

    /// 正在运行的命令的输出行
    fn on_output_line(&mut self, _line: &str) {}
}

/// 工作线程 → 事件循环
#[derive(Debug)]
pub enum WorkerEvent {
    StatusResolved {
        entry: EntryId,
        revision: u64,
        installed: bool,
    },
    OutputLine {
        op: OperationId,
        line: String,
    },
    Finished {
        op: OperationId,
        result: OperationResult,
    },
}
