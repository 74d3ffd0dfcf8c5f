//! 安装状态探测

use super::query::PackageQuery;
use crate::catalogue::InstallState;
use std::sync::Arc;

/// 逐个查询条目的目标包，全部已安装才算已安装。
/// 查询失败一律当作未安装，不向调用方暴露错误。
#[derive(Clone)]
pub struct StatusChecker {
    query: Arc<dyn PackageQuery>,
}

impl StatusChecker {
    pub fn new(query: Arc<dyn PackageQuery>) -> Self {
        Self { query }
    }

    pub fn check(&self, targets: &[String]) -> InstallState {
        if targets.is_empty() {
            return InstallState::NotInstalled;
        }
        for target in targets {
            match self.query.is_installed(target) {
                Ok(true) => {}
                Ok(false) => return InstallState::NotInstalled,
                Err(e) => {
                    log::debug!("探测 {} 失败，按未安装处理: {}", target, e);
                    return InstallState::NotInstalled;
                }
            }
        }
        InstallState::Installed
    }

    /// 主目标未全部安装时再看备选包，装了任一版本都算已安装
    pub fn check_with_alternate(&self, targets: &[String], alternate: Option<&str>) -> InstallState {
        let primary = self.check(targets);
        match alternate {
            Some(alt) if primary != InstallState::Installed => self.check(&[alt.to_string()]),
            _ => primary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::query::MockPackageQuery;
    use crate::package_manager::types::QueryError;
    use mockall::predicate::eq;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_targets_installed() {
        let mut query = MockPackageQuery::new();
        query.expect_is_installed().times(3).returning(|_| Ok(true));

        let checker = StatusChecker::new(Arc::new(query));
        assert_eq!(
            checker.check(&targets(&["wine", "q4wine", "winetricks"])),
            InstallState::Installed
        );
    }

    #[test]
    fn test_one_missing_target_means_not_installed() {
        let mut query = MockPackageQuery::new();
        query
            .expect_is_installed()
            .with(eq("x"))
            .returning(|_| Ok(true));
        query
            .expect_is_installed()
            .with(eq("y"))
            .returning(|_| Ok(false));

        let checker = StatusChecker::new(Arc::new(query));
        assert_eq!(checker.check(&targets(&["x", "y"])), InstallState::NotInstalled);
    }

    #[test]
    fn test_query_failure_is_absorbed() {
        let mut query = MockPackageQuery::new();
        query
            .expect_is_installed()
            .returning(|_| Err(QueryError::ToolMissing("dpkg".to_string())));

        let checker = StatusChecker::new(Arc::new(query));
        assert_eq!(checker.check(&targets(&["pkgA"])), InstallState::NotInstalled);
    }

    #[test]
    fn test_stops_at_first_missing_target() {
        let mut query = MockPackageQuery::new();
        query
            .expect_is_installed()
            .with(eq("a"))
            .times(1)
            .returning(|_| Ok(false));
        query.expect_is_installed().with(eq("b")).never();

        let checker = StatusChecker::new(Arc::new(query));
        assert_eq!(checker.check(&targets(&["a", "b"])), InstallState::NotInstalled);
    }

    #[test]
    fn test_alternate_counts_as_installed() {
        let mut query = MockPackageQuery::new();
        query
            .expect_is_installed()
            .with(eq("transmission-qt"))
            .returning(|_| Ok(false));
        query
            .expect_is_installed()
            .with(eq("transmission-gtk"))
            .returning(|_| Ok(true));

        let checker = StatusChecker::new(Arc::new(query));
        assert_eq!(
            checker.check_with_alternate(&targets(&["transmission-qt"]), Some("transmission-gtk")),
            InstallState::Installed
        );
        assert_eq!(
            checker.check_with_alternate(&targets(&["transmission-qt"]), None),
            InstallState::NotInstalled
        );
    }

    #[test]
    fn test_empty_targets_not_installed() {
        let checker = StatusChecker::new(Arc::new(MockPackageQuery::new()));
        assert_eq!(checker.check(&[]), InstallState::NotInstalled);
    }
}
