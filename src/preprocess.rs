//! 词法预处理器：把自由文本改写成适合依存句法分析的形式
//!
//! 处理顺序固定：
//! 1. 提取引号括起的字面量，替换为占位符
//! 2. 全文转小写
//! 3. 把 `YY|YYYY-MM-YY|YYYY` 形式的日期改写为斜杠分隔的单一词元
//! 4. 按表顺序替换固定查询触发词
//! 5. 替换已配置的组件名
//! 6. 把多词运算符改写为复合词元
//!
//! 所有替换都是朴素的子串替换，不考虑词边界。组件名或触发词如果是
//! 其他单词的子串会被过度匹配，这是已接受的启发式局限。

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::grammar::Grammar;

/// 占位符指向的原始内容
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    /// 引号字面量（已去掉引号）
    Literal(String),
    /// 组件表下标
    Component(usize),
    /// 固定查询表下标
    FixedQuery(usize),
}

/// 预处理结果：改写后的文本加上占位符边表
#[derive(Debug, Default)]
pub struct Prepared {
    pub text: String,
    placeholders: HashMap<String, Placeholder>,
}

impl Prepared {
    /// 按词元文本精确解析占位符
    pub fn resolve(&self, token_text: &str) -> Option<&Placeholder> {
        self.placeholders.get(token_text)
    }
}

// 占位符后缀。解析一律走边表，后缀只需要在正常输入里足够罕见。
const LITERAL_MARK: &str = "u9txt";
const COMPONENT_MARK: &str = "u9cmp";
const FIXED_MARK: &str = "u9fxq";

/// 多词运算符改写表，顺序即应用顺序。
/// 前面的改写会喂给后面的：`is not in` 经 `not in`->`notin` 与
/// `is not`->`isnot` 两步得到 `isnotin`。
const REWRITES: &[(&str, &str)] = &[
    ("is in", "isin"),
    ("not in", "notin"),
    ("is not", "isnot"),
    ("not like", "notlike"),
    ("is not in", "isnotin"),
    ("to me", "tome"),
    ("open and closed", "all"),
    ("opened and closed", "all"),
];

/// 对原始句子做全部词法改写。整个过程不会失败。
pub fn prepare(grammar: &Grammar, raw: &str) -> Prepared {
    // 引号字面量必须位于行首或空白之后
    let quoted_re = Regex::new(r#"(^|\s)('[^']*'|"[^"]*")"#).unwrap();
    let date_re = Regex::new(r"(?m)(^|\s)(\d{4}|\d{2})-(\d{2})-(\d{4}|\d{2})(\s|$)").unwrap();

    let mut placeholders = HashMap::new();
    let mut text = raw.to_string();

    // 1. 用户明确要求按单一词元理解引号内容
    let mut index = 0;
    while let Some(caps) = quoted_re.captures(&text) {
        let Some(quoted) = caps.get(2) else { break };
        let literal = quoted
            .as_str()
            .trim_matches(|c| c == '\'' || c == '"')
            .to_string();
        let marker = format!("{index}{LITERAL_MARK}");
        let range = quoted.range();
        debug!(marker = %marker, literal = %literal, "提取引号字面量");
        placeholders.insert(marker.clone(), Placeholder::Literal(literal));
        text.replace_range(range, &marker);
        index += 1;
    }

    // 2.
    text = text.to_lowercase();

    // 3. 让句法分析把日期当成一个整体
    text = date_re.replace_all(&text, "$1 $2/$3/$4 $5").into_owned();

    // 4. 固定查询触发词
    for (i, (trigger, _)) in grammar.fixed_queries().iter().enumerate() {
        let marker = format!("{i}{FIXED_MARK}");
        if text.contains(trigger.as_str()) {
            debug!(trigger = %trigger, marker = %marker, "替换固定查询触发词");
            text = text.replace(trigger.as_str(), &marker);
        }
        placeholders.insert(marker, Placeholder::FixedQuery(i));
    }

    // 5. 组件名对我们来说是已知的
    for (i, component) in grammar.components_lower().iter().enumerate() {
        let marker = format!("{i}{COMPONENT_MARK}");
        if text.contains(component.as_str()) {
            debug!(component = %component, marker = %marker, "替换组件名");
            text = text.replace(component.as_str(), &marker);
        }
        placeholders.insert(marker, Placeholder::Component(i));
    }

    // 6.
    for (phrase, compound) in REWRITES {
        text = text.replace(phrase, compound);
    }

    debug!(text = %text, "预处理完成");
    Prepared { text, placeholders }
}
