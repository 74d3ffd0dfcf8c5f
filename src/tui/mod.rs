mod entries;
mod layout;
pub mod state;
mod theme;

use crate::catalogue::Catalogue;
use crate::config::Config;
use crate::package_manager::{PackageManager, ToolSet};
use crate::supervisor::{Backend, OperationRequest, OperationSupervisor};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use state::App;
use std::io;
use std::time::Duration;

const KEY_HINTS: &str = "↑↓ 选择 | i 安装 | a 安装备选 | r 卸载 | u 更新列表 | Esc 取消 | F5 刷新 | q 退出";

pub async fn run(config: Config, catalogue: Catalogue) -> Result<()> {
    // 终端初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let pm = PackageManager::detect(&ToolSet::from_config(&config));
    let mut supervisor = OperationSupervisor::new(catalogue, Backend::from_config(&config));
    let mut app = App::new(supervisor.catalogue(), pm.name());

    // 启动时探测所有条目
    supervisor.refresh_all();

    let result = event_loop(&mut terminal, &mut app, &mut supervisor).await;

    // 退出前取消正在运行的操作并等待它结束
    let stopped = supervisor.shutdown(&mut app).await;

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if !stopped {
        log::error!("退出时仍有操作未能取消");
        eprintln!("警告: 正在运行的包管理器命令未能取消，可能仍在后台运行");
        eprintln!("日志: {}", config.log_path().display());
    }

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    supervisor: &mut OperationSupervisor,
) -> Result<()> {
    loop {
        supervisor.drain(app);
        app.tick();

        terminal.draw(|f| ui(f, app, supervisor))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key, app, supervisor);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(key: KeyEvent, app: &mut App, supervisor: &mut OperationSupervisor) {
    let request = match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        KeyCode::Up => {
            app.select_prev();
            return;
        }
        KeyCode::Down => {
            app.select_next();
            return;
        }
        KeyCode::Esc => {
            if supervisor.cancel() {
                app.status = "正在取消...".to_string();
            }
            return;
        }
        KeyCode::F(5) => {
            supervisor.refresh_all();
            app.status = "正在检测安装状态...".to_string();
            return;
        }
        KeyCode::Char('u') => OperationRequest::system_update(),
        KeyCode::Char(c @ ('i' | 'a' | 'r')) => {
            let Some(id) = app.selected_id().cloned() else {
                return;
            };
            match c {
                'i' => OperationRequest::install(id),
                'a' => OperationRequest::install_alternate(id),
                _ => OperationRequest::remove(id),
            }
        }
        _ => return,
    };

    let admission = supervisor.request(request, app);
    app.note_admission(&admission);
}

fn ui(f: &mut Frame, app: &App, supervisor: &OperationSupervisor) {
    let chunks = layout::main_layout(f.area());

    let mut title = format!(
        "📦 pkgtoken v{} | 包管理器: {}",
        env!("CARGO_PKG_VERSION"),
        app.package_manager
    );
    if let Some(request) = supervisor.running_request() {
        title.push_str(&format!("  {} {}中", app.spinner_frame(), request.action.verb()));
    }
    layout::render_header(f, &title, chunks[0]);

    let columns = layout::content_columns(chunks[1]);
    entries::render_entries(f, app, supervisor.catalogue(), columns[0]);
    layout::render_log(f, "输出", &app.log, columns[1]);

    layout::render_footer(f, &app.status, KEY_HINTS, chunks[2]);
}
