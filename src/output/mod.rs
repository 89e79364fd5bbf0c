//! 输出规范化模块
//! 去除 ANSI 控制序列、回车符以及命令输出末尾的提示符行

use once_cell::sync::Lazy;
use regex::Regex;

use common::{ROOT_PROMPT, USER_PROMPT};

/// ANSI/VT100 控制序列
///
/// 依次匹配：OSC（以 BEL 或 ST 结尾）、CSI（`ESC [` 或 0x9B 开头）、两字节 Fp/Fe 转义
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)|(?:\x1B\[|\x{9B})[0-?]*[ -/]*[@-~]|\x1B[0-?@-Z\\-_]",
    )
    .unwrap()
});

/// 去除文本中的 ANSI 控制序列
///
/// 重复替换直到不再匹配，移除后拼接出的新序列也会被清除，因此该函数是幂等的
pub fn strip_ansi(input: &str) -> String {
    let mut text = input.to_string();
    loop {
        let replaced = ANSI_ESCAPE.replace_all(&text, "");
        if replaced.len() == text.len() {
            return text;
        }
        text = replaced.into_owned();
    }
}

/// 输出中是否出现提示符（内置的两种结尾或当前自定义标记）
pub fn contains_prompt(text: &str, marker: &str) -> bool {
    text.contains(ROOT_PROMPT)
        || text.contains(USER_PROMPT)
        || (!marker.is_empty() && text.contains(marker))
}

/// 规范化一次交互式命令的原始输出
///
/// 出现提示符时：按行切分并丢弃最后一行（重新出现的提示符），去掉 `\r` 和控制序列。
/// 未出现提示符时（通常是超时交付），末行不可信，只做空白级别的清理
///
/// 注意：`marker` 只做子串匹配。过短的自定义标记（如 `$`、`>`）也会出现在普通输出中，
/// 此时即使提示符没有出现，最后一行也会被丢弃。自定义标记应取提示符中足够独特的结尾
pub fn normalize_command_output(raw: &str, marker: &str) -> String {
    if contains_prompt(raw, marker) {
        let mut lines: Vec<&str> = raw.split('\n').collect();
        lines.pop();
        strip_ansi(&lines.join("\n").replace('\r', ""))
    } else {
        raw.replace('\r', "").trim_end().to_string()
    }
}
