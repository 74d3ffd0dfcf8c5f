use crate::catalogue::{Catalogue, EntryId, PackageEntry};
use crate::supervisor::{Admission, OperationResult, SupervisorObserver, Verb};
use chrono::Local;
use std::collections::{HashMap, VecDeque};

/// 日志面板最多保留的行数
pub const LOG_CAPACITY: usize = 500;

pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// 条目的界面侧状态，与 `PackageEntry` 分开存放
#[derive(Debug, Clone, Default)]
pub struct EntryView {
    /// 正在被操作
    pub busy: bool,
    /// 最近一次操作的结果
    pub message: Option<String>,
}

pub struct App {
    /// 按分类排好的显示顺序
    pub order: Vec<EntryId>,
    pub views: HashMap<EntryId, EntryView>,
    pub selected: usize,
    pub status: String,
    pub log: VecDeque<String>,
    pub spinner: usize,
    pub updating: bool,
    pub package_manager: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(catalogue: &Catalogue, package_manager: &str) -> Self {
        // 分类按首次出现的顺序排列，同分类内保持目录顺序
        let mut categories: Vec<&str> = Vec::new();
        for entry in catalogue.entries() {
            if !categories.contains(&entry.category.as_str()) {
                categories.push(&entry.category);
            }
        }
        let order: Vec<EntryId> = categories
            .iter()
            .flat_map(|category| {
                catalogue
                    .entries()
                    .iter()
                    .filter(move |e| e.category == *category)
                    .map(|e| e.id.clone())
            })
            .collect();
        let views = order
            .iter()
            .map(|id| (id.clone(), EntryView::default()))
            .collect();

        Self {
            order,
            views,
            selected: 0,
            status: "正在检测安装状态...".to_string(),
            log: VecDeque::new(),
            spinner: 0,
            updating: false,
            package_manager: package_manager.to_string(),
            should_quit: false,
        }
    }

    pub fn selected_id(&self) -> Option<&EntryId> {
        self.order.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.order.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn view(&self, id: &EntryId) -> Option<&EntryView> {
        self.views.get(id)
    }

    /// 任一条目忙碌或系统更新进行中
    pub fn is_busy(&self) -> bool {
        self.updating || self.views.values().any(|v| v.busy)
    }

    pub fn tick(&mut self) {
        if self.is_busy() {
            self.spinner = (self.spinner + 1) % SPINNER.len();
        }
    }

    pub fn spinner_frame(&self) -> &'static str {
        SPINNER[self.spinner % SPINNER.len()]
    }

    pub fn push_log(&mut self, line: String) {
        if self.log.len() >= LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn log_event(&mut self, text: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        self.push_log(format!("[{}] {}", stamp, text));
    }

    /// 请求被拒绝时给出提示；被接受时由观察者回调更新界面
    pub fn note_admission(&mut self, admission: &Admission) {
        match admission {
            Admission::Admitted(_) => {}
            Admission::Busy => self.status = "已有操作在进行中，请等待完成或按 Esc 取消".to_string(),
            Admission::Invalid(reason) => self.status = reason.clone(),
        }
    }

    fn view_mut(&mut self, id: &EntryId) -> &mut EntryView {
        self.views.entry(id.clone()).or_default()
    }
}

fn describe_result(verb: Verb, result: &OperationResult) -> String {
    match result {
        OperationResult::Success => format!("{}完成", verb),
        OperationResult::Failure(detail) => format!("{}失败: {}", verb, detail),
        OperationResult::Cancelled => format!("{}已取消", verb),
    }
}

impl SupervisorObserver for App {
    fn on_operation_started(&mut self, entry: &PackageEntry, verb: Verb) {
        let view = self.view_mut(&entry.id);
        view.busy = true;
        view.message = None;
        self.status = format!("正在{} {}...", verb, entry.name);
        self.log_event(&format!("开始{} {}", verb, entry.name));
    }

    fn on_operation_finished(&mut self, entry: &PackageEntry, verb: Verb, result: &OperationResult) {
        let message = describe_result(verb, result);
        let view = self.view_mut(&entry.id);
        view.busy = false;
        view.message = Some(message.clone());
        self.status = format!("{}: {}", entry.name, message);
        self.log_event(&format!("{} {}", entry.name, message));
    }

    fn on_status_resolved(&mut self, entry: &PackageEntry, installed: bool) {
        log::debug!("{} 安装状态: {}", entry.id, installed);
        if self.status.starts_with("正在检测") {
            self.status = "就绪".to_string();
        }
    }

    fn on_system_update_started(&mut self) {
        self.updating = true;
        self.status = "正在更新软件包列表...".to_string();
        self.log_event("开始更新软件包列表");
    }

    fn on_system_update_finished(&mut self, result: &OperationResult) {
        self.updating = false;
        let message = describe_result(Verb::Update, result);
        self.log_event(&message);
        self.status = message;
    }

    fn on_output_line(&mut self, line: &str) {
        self.push_log(line.to_string());
    }
}
