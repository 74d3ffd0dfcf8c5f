//! 输出解析函数

/// 清理终端输出中的 ANSI 转义序列和特殊字符
pub fn clean_terminal_output(input: &str) -> String {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        chars.next();
                        if next.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            '\r' => {
                if chars.peek() != Some(&'\n') && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
            c if c.is_control() && c != '\n' && c != '\t' => {}
            _ => result.push(c),
        }
    }

    let lines: Vec<&str> = result.lines().collect();
    let mut cleaned_lines = Vec::new();
    let mut prev_empty = false;

    for line in lines {
        let is_empty = line.trim().is_empty();
        if is_empty && prev_empty {
            continue;
        }
        cleaned_lines.push(line);
        prev_empty = is_empty;
    }

    cleaned_lines.join("\n")
}

/// 判断包列表输出中是否有一行以已安装标记开头且包名匹配
///
/// dpkg -l 的输出形如：
/// ```text
/// ||/ Name           Version      Architecture Description
/// +++-==============-============-============-=================
/// ii  wine           8.0~repack-4 amd64        Windows API implementation
/// ```
/// 多架构包名会带 `:amd64` 之类的后缀。
pub fn has_installed_marker(listing: &str, marker: &str, name: &str) -> bool {
    listing.lines().any(|line| {
        let mut cols = line.split_whitespace();
        match (cols.next(), cols.next()) {
            (Some(status), Some(pkg)) if status == marker => {
                let base = pkg.split(':').next().unwrap_or(pkg);
                base == name
            }
            _ => false,
        }
    })
}

/// 失败时展示给用户的细节：优先取 stderr 的最后一行，其次 stdout
pub fn failure_detail(stdout: &str, stderr: &str) -> String {
    last_meaningful_line(stderr)
        .or_else(|| last_meaningful_line(stdout))
        .unwrap_or_default()
}

fn last_meaningful_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}
