//! Markdown 特征检测模块
//!
//! # 设计思路
//!
//! 从笔记软件、聊天工具或编辑器复制出的文本常带有 Markdown 标记，
//! 这类内容应保存为 `.md` 而非 `.txt`。本模块用一组多行正则识别常见 Markdown 结构，
//! 任意一条命中即视为 Markdown。
//!
//! # 实现思路
//!
//! - 使用 `RegexSet` 进行一次性多模式匹配，性能优于逐条匹配。
//! - 通过 `once_cell::sync::Lazy` 在首次调用时编译正则，后续零成本复用。
//! - 该检测是启发式的：只要出现一处特征就判定，宁可多判为 Markdown。

use once_cell::sync::Lazy;
use regex::RegexSet;

/// 预编译的正则表达式集合：用于 Markdown 特征检测
///
/// 检测的模式包括：
/// 1. ATX 标题（`#` ~ `######` 后跟空格）
/// 2. 无序列表（`-` / `*` / `+` 后跟空格）
/// 3. 有序列表（`1.` / `1)` 后跟空格）
/// 4. 围栏代码块（```` ``` ```` 或 `~~~`）
/// 5. 引用块（`>`）
/// 6. 链接与图片（`[text](url)`）
/// 7. 粗体（`**text**` / `__text__`）
/// 8. 斜体（`*text*` / `_text_`）
static MARKDOWN_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?m)^[ \t]{0,3}#{1,6} ",
        r"(?m)^[ \t]*[-*+] \S",
        r"(?m)^[ \t]*\d{1,9}[.)] \S",
        r"(?m)^[ \t]{0,3}(```|~~~)",
        r"(?m)^[ \t]{0,3}> ?\S",
        r"!?\[[^\]\n]+\]\([^)\s]+\)",
        r"\*\*[^*\s][^*\n]*\*\*",
        r"__[^_\s][^_\n]*__",
        r"(?m)(^|[\s(])\*[^*\s][^*\n]*\*([\s.,;:!?)]|$)",
        r"(?m)(^|[\s(])_[^_\s][^_\n]*_([\s.,;:!?)]|$)",
    ])
    .expect("markdown patterns must compile")
});

/// 判断文本是否带有 Markdown 结构
///
/// # 参数
/// * `text` - 剪贴板中的文本内容
///
/// # 返回
/// - `true`：至少命中一条 Markdown 特征
/// - `false`：未命中任何特征
pub fn is_likely_markdown(text: &str) -> bool {
    MARKDOWN_PATTERNS.is_match(text)
}
