//! 第三方软件源（keyring 包）的按需安装

use super::query::PackageQuery;
use super::runner::Launch;
use super::PackageManager;
use std::sync::Arc;

pub struct RepositoryEnsurer {
    query: Arc<dyn PackageQuery>,
    package_manager: PackageManager,
}

impl RepositoryEnsurer {
    pub fn new(query: Arc<dyn PackageQuery>, package_manager: PackageManager) -> Self {
        Self {
            query,
            package_manager,
        }
    }

    /// 确认软件源包已安装，缺失时同步安装。返回结束后软件源是否存在。
    ///
    /// 失败只记日志，不中断调用方：后续的安装仍会照常尝试。
    pub fn ensure(&self, repo: &str, launcher: &dyn Launch) -> bool {
        match self.query.is_installed(repo) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => log::debug!("查询软件源 {} 失败，尝试安装: {}", repo, e),
        }

        log::info!("软件源 {} 缺失，开始安装", repo);
        let argv = self.package_manager.install_command(&[repo.to_string()]);
        let result = launcher
            .launch(argv)
            .and_then(|handle| handle.wait())
            .and_then(|output| output.check());

        match result {
            Ok(output) if output.success() => true,
            Ok(_) => {
                log::warn!("软件源 {} 的安装被取消", repo);
                false
            }
            Err(e) => {
                log::warn!("安装软件源 {} 失败，继续安装目标包: {}", repo, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::query::MockPackageQuery;
    use crate::package_manager::runner::{ProcessHandle, PrivilegedRunner};
    use crate::package_manager::types::RunnerError;
    use mockall::predicate::eq;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 记录被启动的命令，用 sh 模拟其退出码
    struct RecordingLauncher {
        exit_code: i32,
        launched: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingLauncher {
        fn new(exit_code: i32) -> Self {
            Self {
                exit_code,
                launched: Mutex::new(Vec::new()),
            }
        }

        fn launched(&self) -> Vec<Vec<String>> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl Launch for RecordingLauncher {
        fn launch(&self, argv: Vec<String>) -> Result<Arc<ProcessHandle>, RunnerError> {
            self.launched.lock().unwrap().push(argv);
            let script = format!("exit {}", self.exit_code);
            let runner = PrivilegedRunner::new(Duration::from_secs(1));
            let handle = runner.start(&["sh".to_string(), "-c".to_string(), script], None)?;
            Ok(Arc::new(handle))
        }
    }

    fn apt() -> PackageManager {
        PackageManager::new("pkexec", "apt")
    }

    #[test]
    fn test_present_repository_is_not_reinstalled() {
        let mut query = MockPackageQuery::new();
        query
            .expect_is_installed()
            .with(eq("brave-keyring"))
            .returning(|_| Ok(true));
        let launcher = RecordingLauncher::new(0);

        let ensurer = RepositoryEnsurer::new(Arc::new(query), apt());
        assert!(ensurer.ensure("brave-keyring", &launcher));
        assert!(launcher.launched().is_empty());
    }

    #[test]
    fn test_missing_repository_is_installed() {
        let mut query = MockPackageQuery::new();
        query.expect_is_installed().returning(|_| Ok(false));
        let launcher = RecordingLauncher::new(0);

        let ensurer = RepositoryEnsurer::new(Arc::new(query), apt());
        assert!(ensurer.ensure("thorium-repo", &launcher));
        assert_eq!(
            launcher.launched(),
            vec![vec!["pkexec", "apt", "install", "-y", "thorium-repo"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()]
        );
    }

    #[test]
    fn test_install_failure_is_swallowed() {
        let mut query = MockPackageQuery::new();
        query.expect_is_installed().returning(|_| Ok(false));
        let launcher = RecordingLauncher::new(1);

        let ensurer = RepositoryEnsurer::new(Arc::new(query), apt());
        assert!(!ensurer.ensure("brave-keyring", &launcher));
        assert_eq!(launcher.launched().len(), 1);
    }
}
