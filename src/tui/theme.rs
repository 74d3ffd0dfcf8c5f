//! 主题色定义，全局统一使用

use crate::catalogue::InstallState;
use ratatui::style::Color;

/// 强调色（边框、分类标题）
pub const ACCENT: Color = Color::Rgb(245, 169, 184);
/// 条目名称
pub const NAME: Color = Color::Rgb(91, 206, 250);
/// 选中行背景色
pub const SEL_BG: Color = Color::Rgb(45, 35, 55);
/// 亮白色
pub const BRIGHT_WHITE: Color = Color::Rgb(255, 255, 255);
/// 暗灰色（次要信息）
pub const DIM: Color = Color::Rgb(130, 130, 140);
/// 描述文字灰色（选中行内）
pub const DESC_DIM: Color = Color::Rgb(180, 180, 190);

pub const INSTALLED: Color = Color::Rgb(120, 220, 140);
pub const CHECKING: Color = Color::Yellow;

/// 安装状态徽标
pub fn badge(state: InstallState) -> (&'static str, Color) {
    match state {
        InstallState::Installed => ("已安装", INSTALLED),
        InstallState::NotInstalled => ("未安装", DIM),
        InstallState::Checking => ("检测中", CHECKING),
        InstallState::Unknown => ("  ?   ", DIM),
    }
}
