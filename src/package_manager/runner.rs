//! 提权包管理器命令的执行与取消
//!
//! 子进程在独立进程组中运行，取消时对整个进程组发信号：
//!   1. SIGTERM：让 pkexec + apt 有机会正常退出
//!   2. SIGKILL：宽限期内仍未退出时发送，随后无条件回收
//!
//! `ProcessHandle` 可以跨线程共享：工作线程阻塞在 `wait`，
//! UI 线程随时可以调用 `cancel`。

use super::parser::clean_terminal_output;
use super::types::{Exit, RunOutput, RunnerError};
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// 轮询子进程状态的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// 进程退出后等待输出读取线程收尾的上限（孙进程可能继续持有管道）
const READER_GRACE: Duration = Duration::from_secs(1);
/// 取消宽限期上限，过大的配置值按此截断
pub const MAX_GRACE: Duration = Duration::from_secs(60);

/// 输出行回调，在读取线程中调用
pub type LineSink = Arc<dyn Fn(String) + Send + Sync>;

/// 启动命令并返回可取消的句柄
pub trait Launch {
    fn launch(&self, argv: Vec<String>) -> Result<Arc<ProcessHandle>, RunnerError>;
}

#[derive(Debug, Clone)]
pub struct PrivilegedRunner {
    grace: Duration,
}

impl PrivilegedRunner {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace: grace.min(MAX_GRACE),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// 启动子进程，stdout/stderr 由两个读取线程收集
    pub fn start(
        &self,
        argv: &[String],
        sink: Option<LineSink>,
    ) -> Result<ProcessHandle, RunnerError> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        unsafe {
            cmd.pre_exec(|| {
                // 独立进程组，方便统一终止 pkexec + apt 整棵进程树
                libc::setpgid(0, 0);
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }
        let mut child = cmd.spawn().map_err(|source| RunnerError::SpawnFailed {
            program: program.clone(),
            source,
        })?;
        log::info!("已启动 [{}] pid={}", argv.join(" "), child.id());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_rx = spawn_reader(stdout, sink.clone(), false);
        let stderr_rx = spawn_reader(stderr, sink, true);

        Ok(ProcessHandle {
            program: program.clone(),
            pid: child.id(),
            child: Mutex::new(child),
            readers: Mutex::new(Some((stdout_rx, stderr_rx))),
            cancelled: AtomicBool::new(false),
            cancelling: AtomicBool::new(false),
            grace: self.grace,
        })
    }

    /// 启动并阻塞等待结束，非零退出码转换为错误
    pub fn run(&self, argv: &[String], sink: Option<LineSink>) -> Result<RunOutput, RunnerError> {
        self.start(argv, sink)?.wait()?.check()
    }
}

pub struct ProcessHandle {
    program: String,
    pid: u32,
    child: Mutex<Child>,
    readers: Mutex<Option<(std_mpsc::Receiver<String>, std_mpsc::Receiver<String>)>>,
    /// 已向仍在运行的进程发出终止信号
    cancelled: AtomicBool,
    cancelling: AtomicBool,
    grace: Duration,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl ProcessHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 阻塞直到子进程退出。被取消的进程无论退出码如何都报告 `Exit::Cancelled`
    pub fn wait(&self) -> Result<RunOutput, RunnerError> {
        let status = loop {
            if let Some(status) = self.try_status()? {
                break status;
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        let (stdout, stderr) = self.collect_output();

        let exit = if self.is_cancelled() {
            Exit::Cancelled
        } else if status.success() {
            Exit::Success
        } else {
            Exit::Code(status.code())
        };
        log::info!("{} (pid={}) 结束: {:?}", self.program, self.pid, exit);

        Ok(RunOutput {
            stdout,
            stderr,
            exit,
        })
    }

    /// 请求取消：SIGTERM → 等待宽限期 → SIGKILL → 回收。
    ///
    /// 幂等；进程已经退出时什么也不做。会阻塞最多宽限期加上回收时间，
    /// 调用方应在工作线程中执行。
    pub fn cancel(&self) {
        if self.cancelling.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.signal_if_running(libc::SIGTERM, true) {
            log::debug!("{} (pid={}) 已退出，忽略取消", self.program, self.pid);
            return;
        }
        log::info!("已向 {} (pid={}) 发送 SIGTERM", self.program, self.pid);

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            if self.has_exited() {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        log::warn!(
            "{} (pid={}) 在 {:?} 内未退出，发送 SIGKILL",
            self.program,
            self.pid,
            self.grace
        );
        if self.signal_if_running(libc::SIGKILL, false) {
            let mut child = lock(&self.child);
            if let Err(e) = child.wait() {
                log::warn!("回收 {} (pid={}) 失败: {}", self.program, self.pid, e);
            }
        }
    }

    fn try_status(&self) -> Result<Option<ExitStatus>, RunnerError> {
        let mut child = lock(&self.child);
        Ok(child.try_wait()?)
    }

    fn has_exited(&self) -> bool {
        // try_wait 出错时按已退出处理，避免宽限期循环对失效的 pid 继续发信号
        self.try_status().map(|s| s.is_some()).unwrap_or(true)
    }

    /// 持锁确认进程尚未被回收后再发信号，避免误杀复用的 pid
    fn signal_if_running(&self, signal: libc::c_int, mark_cancelled: bool) -> bool {
        let mut child = lock(&self.child);
        match child.try_wait() {
            Ok(None) => {}
            _ => return false,
        }
        if mark_cancelled {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        let pid = self.pid as libc::pid_t;
        unsafe {
            if libc::kill(-pid, signal) != 0 {
                // 进程组不存在（setpgid 尚未生效）时退回到单个进程
                libc::kill(pid, signal);
            }
        }
        true
    }

    fn collect_output(&self) -> (String, String) {
        let readers = lock(&self.readers).take();
        match readers {
            Some((stdout_rx, stderr_rx)) => {
                let deadline = Instant::now() + READER_GRACE;
                let stdout = recv_until(&stdout_rx, deadline);
                let stderr = recv_until(&stderr_rx, deadline);
                (stdout, stderr)
            }
            None => (String::new(), String::new()),
        }
    }
}

fn recv_until(rx: &std_mpsc::Receiver<String>, deadline: Instant) -> String {
    let timeout = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(timeout).unwrap_or_default()
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_reader(
    stream: Option<impl Read + Send + 'static>,
    sink: Option<LineSink>,
    is_stderr: bool,
) -> std_mpsc::Receiver<String> {
    let (tx, rx) = std_mpsc::channel();
    std::thread::spawn(move || {
        let text = read_stream_lines(stream, sink.as_ref(), is_stderr);
        let _ = tx.send(text);
    });
    rx
}

/// 从流中读取行；完整内容作为返回值，清理后的每一行同时交给 sink。
/// `\r` 刷新的进度行只发给 sink，不计入返回值。stderr 行加 `⚠ ` 前缀。
///
/// 按字节切行后再解码：UTF-8 的续字节不会是 `\n`/`\r`，
/// 跨越两次 read 的多字节字符因此总能完整解码。
fn read_stream_lines(
    stream: Option<impl Read>,
    sink: Option<&LineSink>,
    is_stderr: bool,
) -> String {
    let mut result = String::new();
    let Some(mut reader) = stream else {
        return result;
    };
    let emit = |line: &str| {
        if let Some(sink) = sink {
            let msg = if is_stderr {
                format!("⚠ {}", line)
            } else {
                line.to_string()
            };
            sink(msg);
        }
    };
    // keep = 是否计入返回值
    let flush = |line: &mut Vec<u8>, keep: bool, result: &mut String| {
        let cleaned = clean_terminal_output(&String::from_utf8_lossy(line));
        if !cleaned.trim().is_empty() {
            emit(&cleaned);
            if keep {
                result.push_str(&cleaned);
                result.push('\n');
            }
        }
        line.clear();
    };

    let mut buffer = [0u8; 1024];
    let mut line_buffer: Vec<u8> = Vec::new();
    while let Ok(n) = reader.read(&mut buffer) {
        if n == 0 {
            break;
        }
        for &byte in &buffer[..n] {
            match byte {
                b'\n' => flush(&mut line_buffer, true, &mut result),
                b'\r' => flush(&mut line_buffer, false, &mut result),
                _ => line_buffer.push(byte),
            }
        }
    }
    if !line_buffer.is_empty() {
        flush(&mut line_buffer, true, &mut result);
    }
    result
}
