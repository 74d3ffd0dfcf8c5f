//! 操作调度核心
//!
//! - 同一时间最多只有一个安装/卸载/更新操作（单飞），忙碌时新请求被静默拒绝
//! - 阻塞工作（状态探测、提权命令）全部在 `spawn_blocking` 中执行
//! - 工作线程只通过 channel 发回 `WorkerEvent`，条目状态与观察者回调
//!   都由事件循环在 `dispatch` 中处理
//! - 每个条目带一个修订号，操作结束时递增，旧修订号的探测结果被丢弃

mod events;

pub use events::{
    Action, Admission, OperationId, OperationRequest, OperationResult, SupervisorObserver, Verb,
    WorkerEvent,
};

use crate::catalogue::{Catalogue, EntryId, InstallState};
use crate::config::Config;
use crate::package_manager::runner::lock;
use crate::package_manager::{
    DpkgQuery, Exit, Launch, LineSink, PackageManager, PackageQuery, PrivilegedRunner,
    ProcessHandle, RepositoryEnsurer, RunnerError, StatusChecker, ToolSet,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// 退出时等待取消完成的额外余量（SIGKILL 之后的回收）
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(3);

/// 调度器依赖的外部工具
pub struct Backend {
    query: Arc<dyn PackageQuery>,
    runner: PrivilegedRunner,
    tools: ToolSet,
}

impl Backend {
    pub fn new(query: Arc<dyn PackageQuery>, runner: PrivilegedRunner, tools: ToolSet) -> Self {
        Self {
            query,
            runner,
            tools,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(DpkgQuery::from_config(config)),
            PrivilegedRunner::new(config.cancel_grace()),
            ToolSet::from_config(config),
        )
    }
}

/// 正在执行的操作；存在与否即调度器是否忙碌
#[derive(Debug)]
pub struct RunningOperation {
    pub id: OperationId,
    pub request: OperationRequest,
    handle: Option<Arc<ProcessHandle>>,
    cancel_requested: bool,
}

type Gate = Arc<Mutex<Option<RunningOperation>>>;

/// 交给工作线程的操作描述，不引用目录本身
struct OperationPlan {
    id: OperationId,
    action: Action,
    targets: Vec<String>,
    repository: Option<String>,
}

/// 工作线程侧的上下文：启动的每个子进程都登记到闸门里，供取消使用
struct OperationContext {
    id: OperationId,
    gate: Gate,
    runner: PrivilegedRunner,
    sink: LineSink,
}

impl OperationContext {
    fn cancel_requested(&self) -> bool {
        lock(&self.gate)
            .as_ref()
            .map(|op| op.id == self.id && op.cancel_requested)
            .unwrap_or(false)
    }
}

impl Launch for OperationContext {
    fn launch(&self, argv: Vec<String>) -> Result<Arc<ProcessHandle>, RunnerError> {
        let handle = Arc::new(self.runner.start(&argv, Some(self.sink.clone()))?);
        let cancel_now = {
            let mut gate = lock(&self.gate);
            match gate.as_mut() {
                Some(op) if op.id == self.id => {
                    op.handle = Some(handle.clone());
                    op.cancel_requested
                }
                _ => false,
            }
        };
        // 登记前已经请求过取消
        if cancel_now {
            handle.cancel();
        }
        Ok(handle)
    }
}

fn execute(backend: &Backend, ctx: &OperationContext, plan: &OperationPlan) -> OperationResult {
    if ctx.cancel_requested() {
        return OperationResult::Cancelled;
    }

    let pm = PackageManager::detect(&backend.tools);

    if plan.action.is_install() {
        if let Some(repo) = &plan.repository {
            RepositoryEnsurer::new(backend.query.clone(), pm.clone()).ensure(repo, ctx);
            if ctx.cancel_requested() {
                return OperationResult::Cancelled;
            }
        }
    }

    let argv = match plan.action {
        Action::Install | Action::InstallAlternate => pm.install_command(&plan.targets),
        Action::Remove => pm.remove_command(&plan.targets),
        Action::SystemUpdate => pm.update_command(),
    };

    let result = ctx
        .launch(argv)
        .and_then(|handle| handle.wait())
        .and_then(|output| output.check());

    match result {
        Ok(output) if output.exit == Exit::Cancelled => OperationResult::Cancelled,
        Ok(_) => OperationResult::Success,
        Err(e) => OperationResult::Failure(e.to_string()),
    }
}

pub struct OperationSupervisor {
    catalogue: Catalogue,
    backend: Arc<Backend>,
    gate: Gate,
    revisions: HashMap<EntryId, u64>,
    next_id: OperationId,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl OperationSupervisor {
    pub fn new(catalogue: Catalogue, backend: Backend) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            catalogue,
            backend: Arc::new(backend),
            gate: Arc::new(Mutex::new(None)),
            revisions: HashMap::new(),
            next_id: 0,
            tx,
            rx,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.gate).is_some()
    }

    pub fn running_request(&self) -> Option<OperationRequest> {
        lock(&self.gate).as_ref().map(|op| op.request.clone())
    }

    fn current_id(&self) -> Option<OperationId> {
        lock(&self.gate).as_ref().map(|op| op.id)
    }

    fn running_entry(&self) -> Option<EntryId> {
        lock(&self.gate)
            .as_ref()
            .filter(|op| op.request.action != Action::SystemUpdate)
            .and_then(|op| op.request.entry.clone())
    }

    /// 为每个条目启动一次状态探测；正在被操作的条目跳过
    pub fn refresh_all(&mut self) {
        let busy = self.running_entry();
        let ids: Vec<EntryId> = self
            .catalogue
            .entries()
            .iter()
            .map(|e| e.id.clone())
            .filter(|id| busy.as_ref() != Some(id))
            .collect();
        for id in ids {
            self.spawn_status_check(&id, true);
        }
    }

    /// `mark_checking` 为 false 时（操作结束后的复查）条目保持当前状态直到结果到达
    fn spawn_status_check(&mut self, id: &EntryId, mark_checking: bool) {
        let Some(entry) = self.catalogue.get_mut(id) else {
            return;
        };
        if mark_checking && entry.state == InstallState::Unknown {
            entry.state = InstallState::Checking;
        }
        let targets = entry.targets.clone();
        let alternate = entry.alternate.clone();
        let revision = self.revisions.get(id).copied().unwrap_or(0);

        let checker = StatusChecker::new(self.backend.query.clone());
        let tx = self.tx.clone();
        let entry_id = id.clone();
        tokio::task::spawn_blocking(move || {
            let installed = checker
                .check_with_alternate(&targets, alternate.as_deref())
                .is_installed();
            let _ = tx.send(WorkerEvent::StatusResolved {
                entry: entry_id,
                revision,
                installed,
            });
        });
    }

    /// 申请执行一个操作。忙碌时返回 `Admission::Busy`，不排队也不通知观察者
    pub fn request<O>(&mut self, request: OperationRequest, observer: &mut O) -> Admission
    where
        O: SupervisorObserver + ?Sized,
    {
        let action = request.action;
        let (targets, repository) = match (action, &request.entry) {
            (Action::SystemUpdate, _) => (Vec::new(), None),
            (_, None) => return Admission::Invalid("缺少目标条目".to_string()),
            (_, Some(id)) => {
                let Some(entry) = self.catalogue.get(id) else {
                    return Admission::Invalid(format!("未知条目: {}", id));
                };
                let targets = match action {
                    Action::InstallAlternate => match &entry.alternate {
                        Some(alt) => vec![alt.clone()],
                        None => {
                            return Admission::Invalid(format!("{} 没有备选包", entry.name));
                        }
                    },
                    // 备选包也一并卸载，apt 会跳过未安装的包
                    Action::Remove => entry
                        .targets
                        .iter()
                        .cloned()
                        .chain(entry.alternate.clone())
                        .collect(),
                    _ => entry.targets.clone(),
                };
                (targets, entry.repository.clone())
            }
        };

        let id = self.next_id + 1;
        {
            let mut gate = lock(&self.gate);
            if let Some(running) = gate.as_ref() {
                log::debug!(
                    "操作 {} 进行中，忽略请求 {:?}",
                    running.id,
                    request
                );
                return Admission::Busy;
            }
            *gate = Some(RunningOperation {
                id,
                request: request.clone(),
                handle: None,
                cancel_requested: false,
            });
        }
        self.next_id = id;
        log::info!("开始操作 {}: {:?} {:?}", id, action, request.entry);

        match request.entry.as_ref().filter(|_| action != Action::SystemUpdate) {
            Some(entry_id) => {
                if let Some(entry) = self.catalogue.get(entry_id) {
                    observer.on_operation_started(entry, action.verb());
                }
            }
            None => observer.on_system_update_started(),
        }

        self.spawn_worker(OperationPlan {
            id,
            action,
            targets,
            repository,
        });
        Admission::Admitted(id)
    }

    fn spawn_worker(&self, plan: OperationPlan) {
        let id = plan.id;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let sink_tx = self.tx.clone();
        let sink: LineSink = Arc::new(move |line| {
            let _ = sink_tx.send(WorkerEvent::OutputLine { op: id, line });
        });
        let ctx = OperationContext {
            id,
            gate: self.gate.clone(),
            runner: backend.runner.clone(),
            sink,
        };

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || execute(&backend, &ctx, &plan))
                .await
                .unwrap_or_else(|e| {
                    log::error!("操作 {} 的工作线程异常退出: {}", id, e);
                    OperationResult::Failure(format!("工作线程异常退出: {}", e))
                });
            let _ = tx.send(WorkerEvent::Finished { op: id, result });
        });
    }

    /// 取消当前操作；空闲时返回 false。
    /// 信号升级在阻塞线程池中进行，不阻塞事件循环。
    pub fn cancel(&mut self) -> bool {
        let handle = {
            let mut gate = lock(&self.gate);
            match gate.as_mut() {
                None => return false,
                Some(op) => {
                    op.cancel_requested = true;
                    op.handle.clone()
                }
            }
        };
        log::info!("请求取消当前操作");
        if let Some(handle) = handle {
            tokio::task::spawn_blocking(move || handle.cancel());
        }
        true
    }

    /// 在事件循环上下文中处理一条工作线程事件
    pub fn dispatch<O>(&mut self, event: WorkerEvent, observer: &mut O)
    where
        O: SupervisorObserver + ?Sized,
    {
        match event {
            WorkerEvent::StatusResolved {
                entry,
                revision,
                installed,
            } => self.apply_status(entry, revision, installed, observer),
            WorkerEvent::OutputLine { op, line } => {
                if self.current_id() == Some(op) {
                    observer.on_output_line(&line);
                }
            }
            WorkerEvent::Finished { op, result } => self.finish(op, result, observer),
        }
    }

    fn apply_status<O>(&mut self, id: EntryId, revision: u64, installed: bool, observer: &mut O)
    where
        O: SupervisorObserver + ?Sized,
    {
        let current = self.revisions.get(&id).copied().unwrap_or(0);
        if revision != current {
            log::debug!("丢弃 {} 的过期探测结果 (rev {} != {})", id, revision, current);
            return;
        }
        if self.running_entry().as_ref() == Some(&id) {
            log::debug!("{} 正在被操作，丢弃探测结果", id);
            return;
        }
        if let Some(entry) = self.catalogue.get_mut(&id) {
            entry.state = InstallState::from_installed(installed);
            observer.on_status_resolved(entry, installed);
        }
    }

    fn finish<O>(&mut self, op: OperationId, result: OperationResult, observer: &mut O)
    where
        O: SupervisorObserver + ?Sized,
    {
        let running = {
            let mut gate = lock(&self.gate);
            match gate.as_ref() {
                Some(running) if running.id == op => gate.take(),
                _ => None,
            }
        };
        let Some(running) = running else {
            log::warn!("收到未知操作 {} 的结束事件", op);
            return;
        };
        log::info!("操作 {} 结束: {:?}", op, result);

        let action = running.request.action;
        match running.request.entry.filter(|_| action != Action::SystemUpdate) {
            Some(id) => {
                *self.revisions.entry(id.clone()).or_insert(0) += 1;
                if let Some(entry) = self.catalogue.get_mut(&id) {
                    if result == OperationResult::Success {
                        entry.state = InstallState::from_installed(action.is_install());
                    }
                    observer.on_operation_finished(entry, action.verb(), &result);
                }
                // 取消后包数据库状态不确定，保持原样不复查
                if result != OperationResult::Cancelled {
                    self.spawn_status_check(&id, false);
                }
            }
            None => observer.on_system_update_finished(&result),
        }
    }

    /// 处理所有已到达的事件，返回处理条数
    pub fn drain<O>(&mut self, observer: &mut O) -> usize
    where
        O: SupervisorObserver + ?Sized,
    {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event, observer);
            count += 1;
        }
        count
    }

    /// 等待并处理下一条事件
    pub async fn process_next<O>(&mut self, observer: &mut O) -> bool
    where
        O: SupervisorObserver + ?Sized,
    {
        match self.rx.recv().await {
            Some(event) => {
                self.dispatch(event, observer);
                true
            }
            None => false,
        }
    }

    /// 退出前取消正在运行的操作，并等待它结束。
    /// 返回 false 表示超时后操作仍未结束（例如无权向提权进程发信号）
    pub async fn shutdown<O>(&mut self, observer: &mut O) -> bool
    where
        O: SupervisorObserver + ?Sized,
    {
        if !self.cancel() {
            return true;
        }
        let limit = self.backend.runner.grace().saturating_add(SHUTDOWN_MARGIN);
        let waited = tokio::time::timeout(limit, async {
            while self.is_busy() {
                if !self.process_next(observer).await {
                    break;
                }
            }
        })
        .await;
        if waited.is_err() {
            log::warn!("等待操作取消超时（{:?}）", limit);
        }
        !self.is_busy()
    }
}
