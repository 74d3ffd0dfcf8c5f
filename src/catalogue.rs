//! 软件目录：条目定义、安装状态与内置目录

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// 条目的稳定标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Unknown,
    Checking,
    Installed,
    NotInstalled,
}

impl InstallState {
    pub fn from_installed(installed: bool) -> Self {
        if installed {
            InstallState::Installed
        } else {
            InstallState::NotInstalled
        }
    }

    pub fn is_installed(self) -> bool {
        self == InstallState::Installed
    }
}

/// 目录条目，只保存领域状态；渲染相关的句柄由 UI 自己按 id 维护
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub id: EntryId,
    pub name: String,
    pub description: String,
    pub category: String,
    /// 主目标，可能包含多个底层包（如 wine q4wine winetricks）
    pub targets: Vec<String>,
    /// 备选目标（如 transmission-gtk）
    pub alternate: Option<String>,
    pub alternate_label: Option<String>,
    /// 安装前需要存在的软件源/keyring 包
    pub repository: Option<String>,
    pub state: InstallState,
}

impl PackageEntry {
    pub fn new(id: &str, name: &str, targets: &str) -> Self {
        Self {
            id: EntryId::new(id),
            name: name.to_string(),
            description: String::new(),
            category: String::new(),
            targets: split_targets(targets),
            alternate: None,
            alternate_label: None,
            repository: None,
            state: InstallState::Unknown,
        }
    }

    pub fn with_description(mut self, category: &str, description: &str) -> Self {
        self.category = category.to_string();
        self.description = description.to_string();
        self
    }

    pub fn with_alternate(mut self, target: &str, label: &str) -> Self {
        self.alternate = Some(target.to_string());
        self.alternate_label = Some(label.to_string());
        self
    }

    pub fn with_repository(mut self, repository: &str) -> Self {
        self.repository = Some(repository.to_string());
        self
    }
}

/// 按空白拆分多目标描述
pub fn split_targets(targets: &str) -> Vec<String> {
    targets.split_whitespace().map(|s| s.to_string()).collect()
}

/// 外部目录文件中的条目格式
#[derive(Debug, Deserialize)]
struct EntryDef {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    targets: String,
    alternate: Option<String>,
    alternate_label: Option<String>,
    repository: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogueFile {
    #[serde(default)]
    entries: Vec<EntryDef>,
}

#[derive(Debug, Clone)]
pub struct Catalogue {
    entries: Vec<PackageEntry>,
}

impl Catalogue {
    pub fn new(entries: Vec<PackageEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.as_str().is_empty() {
                bail!("目录条目 {:?} 缺少 id", entry.name);
            }
            if entry.targets.is_empty() {
                bail!("目录条目 {} 没有任何目标包", entry.id);
            }
            if !seen.insert(entry.id.clone()) {
                bail!("目录条目 id 重复: {}", entry.id);
            }
        }
        Ok(Self { entries })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Self::from_toml(&content)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogueFile = toml::from_str(content)?;
        let entries = file
            .entries
            .into_iter()
            .map(|def| PackageEntry {
                id: EntryId::new(def.id),
                name: def.name,
                description: def.description,
                category: def.category,
                targets: split_targets(&def.targets),
                alternate: def.alternate.filter(|s| !s.trim().is_empty()),
                alternate_label: def.alternate_label,
                repository: def.repository.filter(|s| !s.trim().is_empty()),
                state: InstallState::Unknown,
            })
            .collect();
        Self::new(entries)
    }

    pub fn builtin() -> Self {
        let emu = "模拟器";
        let game = "游戏";
        let net = "网络";
        let entries = vec![
            PackageEntry::new("melonds", "melonDS", "melonDS").with_description(emu, "Nintendo DS 模拟器"),
            PackageEntry::new("duckstation", "DuckStation", "duckstation").with_description(emu, "PlayStation 1 模拟器"),
            PackageEntry::new("ppsspp", "PPSSPP", "ppsspp").with_description(emu, "PSP 模拟器"),
            PackageEntry::new("flycast", "Flycast", "flycast").with_description(emu, "Dreamcast 模拟器"),
            PackageEntry::new("bigpemu", "BigPEmu", "bigpemu").with_description(emu, "多平台模拟器"),
            PackageEntry::new("rosalie-mg", "Rosalie's Mupen GUI", "rosalie-mg").with_description(emu, "N64 模拟器前端"),
            PackageEntry::new("snes9x", "Snes9x", "snes9x").with_description(emu, "Super Nintendo 模拟器"),
            PackageEntry::new("pico8-games", "Pico8 Games", "pico8-games").with_description(game, "Pico-8 游戏合集"),
            PackageEntry::new("supertux2", "SuperTux 2", "supertux2").with_description(game, "2D 横版跳跃游戏"),
            PackageEntry::new("supertuxkart", "SuperTuxKart", "supertuxkart").with_description(game, "3D 赛车游戏"),
            PackageEntry::new("wine", "Wine + Q4Wine + WineTricks", "wine q4wine winetricks").with_description(game, "Windows 兼容层"),
            PackageEntry::new("lutris", "Lutris", "lutris").with_description(game, "游戏平台"),
            PackageEntry::new("freedoom", "Freedoom 1+2", "freedoom").with_description(game, "自由版 Doom"),
            PackageEntry::new("gnome-2048", "GNOME 2048", "gnome-2048").with_description(game, "2048 益智游戏"),
            PackageEntry::new("prismlauncher", "Prism Launcher", "prismlauncher").with_description(game, "Minecraft 启动器"),
            PackageEntry::new("heroic", "Heroic Games Launcher", "heroic").with_description(game, "Epic Games 启动器"),
            PackageEntry::new("brave", "Brave", "brave-browser")
                .with_description(net, "注重隐私的浏览器")
                .with_repository("brave-keyring"),
            PackageEntry::new("vivaldi", "Vivaldi", "vivaldi-stable").with_description(net, "功能丰富的浏览器"),
            PackageEntry::new("thorium", "Thorium", "thorium-browser")
                .with_description(net, "快速极简的浏览器")
                .with_repository("thorium-repo"),
            PackageEntry::new("falkon", "Falkon", "falkon").with_description(net, "KDE 浏览器"),
            PackageEntry::new("firefox", "Firefox", "firefox").with_description(net, "Mozilla Firefox"),
            PackageEntry::new("floorp", "Floorp", "floorp").with_description(net, "基于 Firefox 的浏览器"),
            PackageEntry::new("transmission", "Transmission", "transmission-qt")
                .with_description(net, "BitTorrent 客户端")
                .with_alternate("transmission-gtk", "GTK"),
            PackageEntry::new("motrix", "Motrix", "motrix").with_description(net, "下载管理器"),
            PackageEntry::new("min", "Min Browser", "min").with_description(net, "极简浏览器"),
            PackageEntry::new("chromium", "Chromium", "chromium-browser").with_description(net, "开源浏览器"),
            PackageEntry::new("materialgram", "Materialgram", "materialgram").with_description(net, "Telegram 客户端"),
            PackageEntry::new("telegram-desktop", "Telegram Desktop", "telegram-desktop").with_description(net, "Telegram 客户端"),
            PackageEntry::new("warpinator", "Warpinator", "warpinator").with_description(net, "局域网文件传输"),
            PackageEntry::new("kdeconnect", "KDE Connect", "kdeconnect").with_description(net, "设备互联"),
        ];
        Self { entries }
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &EntryId) -> Option<&mut PackageEntry> {
        self.entries.iter_mut().find(|e| &e.id == id)
    }

    pub fn state_of(&self, id: &EntryId) -> Option<InstallState> {
        self.get(id).map(|e| e.state)
    }
}
