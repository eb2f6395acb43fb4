//! # 分隔文本编解码
//!
//! ## 设计思路
//!
//! 表格软件复制出来的是制表符分隔文本，单元格内可能含换行、制表符和引号，
//! 这些单元格会被双引号包裹，内部引号写作 `""`。同一个分词器同时服务于：
//! - 分类阶段：判断文本是否构成表格
//! - 编码阶段：把制表符文本重新转义为 RFC 4180 风格的 CSV
//!
//! ## 实现思路
//!
//! - 逐字符状态机，字段开头的 `"` 进入引号模式，引号内的分隔符与换行都是普通字符。
//! - 输入结束时仍在引号内视为解析失败，由 `parse_or_split` 回退为按行朴素切分，
//!   保证剪贴板数据不会被静默丢弃。
//! - 结尾的全空行会被裁掉（复制整行时末尾常带一个换行）。

/// 解析得到的行集合
pub type Rows = Vec<Vec<String>>;

/// 分隔文本解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelimitedError {
    #[error("引号未闭合（起始于第 {line} 行）")]
    UnterminatedQuote { line: usize },
}

/// 引号感知的分隔文本解析。
///
/// 支持 `\n`、`\r\n`、`\r` 三种换行。引号只在字段开头生效，
/// 字段中间出现的 `"` 按字面保留。
pub fn parse_delimited(text: &str, delimiter: char) -> Result<Rows, DelimitedError> {
    let mut rows: Rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut line = 1;
    let mut quote_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !field_started => {
                in_quotes = true;
                field_started = true;
                quote_line = line;
            }
            c if c == delimiter => {
                row.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                line += 1;
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(DelimitedError::UnterminatedQuote { line: quote_line });
    }

    if field_started || !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    trim_trailing_empty_rows(&mut rows);
    Ok(rows)
}

/// 按行、按分隔符朴素切分，不处理引号。
pub fn split_naive(text: &str, delimiter: char) -> Rows {
    let mut rows: Rows = text
        .lines()
        .map(|line| line.split(delimiter).map(str::to_string).collect())
        .collect();
    trim_trailing_empty_rows(&mut rows);
    rows
}

/// 先做引号感知解析，失败时回退到朴素切分。
pub fn parse_or_split(text: &str, delimiter: char) -> Rows {
    match parse_delimited(text, delimiter) {
        Ok(rows) => rows,
        Err(err) => {
            log::debug!("⚠️ 分隔文本解析失败，回退为按行切分: {}", err);
            split_naive(text, delimiter)
        }
    }
}

/// 末尾只含空白字段的行视为空行，分类计数与写出的 CSV 共用这一规则。
fn trim_trailing_empty_rows(rows: &mut Rows) {
    while rows
        .last()
        .is_some_and(|row| row.iter().all(|field| field.trim().is_empty()))
    {
        rows.pop();
    }
}

fn needs_quoting(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
}

/// 把单个字段转义为 CSV 字段。
pub fn escape_csv_field(field: &str) -> String {
    if needs_quoting(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 将行集合序列化为 CSV，每行以 `\r\n` 结尾。
pub fn write_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|field| escape_csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

/// 制表符文本 → CSV 文本（不含 BOM）。
pub fn tab_text_to_csv(tab_text: &str) -> String {
    write_csv(&parse_or_split(tab_text, '\t'))
}
