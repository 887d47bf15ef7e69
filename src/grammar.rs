//! 语法词表：由配置一次性构建的静态词汇表
//!
//! 所有表在构建后不可变，可以在多个并发编译之间自由共享。
//! 触发词集合是固定的英语词表，其余内容全部来自配置。

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::QueryConfig;

// 否定触发词
const NEGATIONS: &[&str] = &[
    "no", "not", "n't", "never", "none", "unlike", "different", "dissimilar", "unequal",
];
// 模糊匹配触发词
const PARTIALS: &[&str] = &[
    "has", "like", "contains", "alike", "related", "close", "matching", "near", "akin",
    "relating", "resembling", "fuzzy", "contain", "in", "isin",
];
const NEGATED_PARTIALS: &[&str] = &["notin", "notlike", "isnotin"];
// 精确匹配触发词
const EXACTS: &[&str] = &[
    "is", "exactly", "exact", "equals", "same", "identical", "specific", "'ve", "have",
];
const NEGATED_EXACTS: &[&str] = &["isnot"];
const STARTINGS: &[&str] = &["starts", "start", "begin", "begins"];
const ENDINGS: &[&str] = &["ends", "end"];
// 第一人称触发词
const FIRST_PERSON: &[&str] = &["me", "my", "i", "tome"];
const CHANGE_MODIFIERS: &[&str] = &["changed", "change", "modified"];
const ON_DATE: &[&str] = &["on"];
const START_DATE: &[&str] = &["from", "since", "after"];
const END_DATE: &[&str] = &["to", "before"];

const NUMBER_WORDS: &[(&str, i64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

/// 已知字段同义词 -> 工单系统的规范字段名
const KNOWN_FIELDS: &[(&str, &str)] = &[
    ("cc", "cc"),
    ("status", "status"),
    ("component", "component"),
    ("components", "component"),
    ("title", "summary"),
    ("summary", "summary"),
    ("text", "description"),
    ("description", "description"),
    ("owner", "owner"),
    ("reporter", "reporter"),
    ("reported", "reporter"),
    ("keywords", "keywords"),
    ("keyword", "keywords"),
    ("severity", "priority"),
    ("priority", "priority"),
    ("milestone", "milestone"),
    ("resolution", "resolution"),
];

/// 由配置构建的不可变词汇表
#[derive(Debug)]
pub struct Grammar {
    negations: HashSet<&'static str>,
    partials: HashSet<&'static str>,
    negated_partials: HashSet<&'static str>,
    exacts: HashSet<&'static str>,
    negated_exacts: HashSet<&'static str>,
    startings: HashSet<&'static str>,
    endings: HashSet<&'static str>,
    first_person: HashSet<&'static str>,
    change_modifiers: HashSet<&'static str>,
    numbers: HashMap<&'static str, i64>,
    /// 优先级，顺序从低到高
    priorities: Vec<String>,
    /// 类型（含朴素复数形式）-> 规范类型名
    types: HashMap<String, String>,
    /// 组件名，下标即占位符编号
    components: Vec<String>,
    components_lower: Vec<String>,
    statuses: HashSet<String>,
    /// 子词集合 -> 完整状态名
    status_sets: HashMap<BTreeSet<String>, String>,
    /// 子词变形（复数、时态）-> 规范子词
    status_subwords: HashMap<String, String>,
    resolutions: HashSet<String>,
    /// 字段同义词 -> 规范字段名
    fields: HashMap<String, String>,
    /// 固定查询（触发词，模板），按表顺序应用
    fixed_queries: Vec<(String, String)>,
}

impl Grammar {
    pub fn new(config: &QueryConfig) -> Self {
        let mut types = HashMap::new();
        for ty in &config.types {
            let ty = ty.to_lowercase();
            types.insert(ty.clone(), ty.clone());
            // 朴素复数形式
            types.insert(format!("{ty}s"), ty);
        }

        let mut statuses = HashSet::new();
        let mut status_sets = HashMap::new();
        let mut status_subwords = HashMap::new();
        for status in &config.statuses {
            let status = status.to_lowercase();
            let mut subwords = BTreeSet::new();
            for sub in status.split('_') {
                subwords.insert(sub.to_string());
                // 变形远谈不上准确，但大多数时候够用
                status_subwords.insert(sub.to_string(), sub.to_string());
                if let Some(stem) = sub.strip_suffix('s') {
                    status_subwords.insert(stem.to_string(), sub.to_string());
                } else {
                    status_subwords.insert(format!("{sub}s"), sub.to_string());
                }
                // 过去式
                if let Some(stem) = sub.strip_suffix("ed") {
                    status_subwords.insert(stem.to_string(), sub.to_string());
                    status_subwords.insert(format!("{stem}ing"), sub.to_string());
                    status_subwords.insert(sub[..sub.len() - 1].to_string(), sub.to_string());
                }
                // 动名词形式
                if let Some(stem) = sub.strip_suffix('e') {
                    status_subwords.insert(format!("{sub}d"), sub.to_string());
                    status_subwords.insert(format!("{stem}ing"), sub.to_string());
                }
            }
            status_sets.insert(subwords, status.clone());
            statuses.insert(status);
        }

        let mut fields: HashMap<String, String> = KNOWN_FIELDS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        // 配置里的自定义字段也加入已知列表
        for field in &config.extra_fields {
            fields.insert(field.to_lowercase(), field.clone());
        }

        Self {
            negations: NEGATIONS.iter().copied().collect(),
            partials: PARTIALS.iter().copied().collect(),
            negated_partials: NEGATED_PARTIALS.iter().copied().collect(),
            exacts: EXACTS.iter().copied().collect(),
            negated_exacts: NEGATED_EXACTS.iter().copied().collect(),
            startings: STARTINGS.iter().copied().collect(),
            endings: ENDINGS.iter().copied().collect(),
            first_person: FIRST_PERSON.iter().copied().collect(),
            change_modifiers: CHANGE_MODIFIERS.iter().copied().collect(),
            numbers: NUMBER_WORDS.iter().copied().collect(),
            priorities: config.priorities.iter().map(|p| p.to_lowercase()).collect(),
            types,
            components_lower: config.components.iter().map(|c| c.to_lowercase()).collect(),
            components: config.components.clone(),
            statuses,
            status_sets,
            status_subwords,
            resolutions: config.resolutions.iter().map(|r| r.to_lowercase()).collect(),
            fields,
            fixed_queries: config
                .fixed_queries
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
        }
    }

    pub fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word)
    }

    pub fn negation_words(&self) -> &HashSet<&'static str> {
        &self.negations
    }

    pub fn is_partial(&self, word: &str) -> bool {
        self.partials.contains(word)
    }

    pub fn is_negated_partial(&self, word: &str) -> bool {
        self.negated_partials.contains(word)
    }

    pub fn is_exact(&self, word: &str) -> bool {
        self.exacts.contains(word)
    }

    pub fn is_negated_exact(&self, word: &str) -> bool {
        self.negated_exacts.contains(word)
    }

    pub fn is_starting(&self, word: &str) -> bool {
        self.startings.contains(word)
    }

    pub fn is_ending(&self, word: &str) -> bool {
        self.endings.contains(word)
    }

    pub fn is_first_person(&self, word: &str) -> bool {
        self.first_person.contains(word)
    }

    pub fn is_change_modifier(&self, word: &str) -> bool {
        self.change_modifiers.contains(word)
    }

    /// 日期边界触发词 -> 伪字段名 on/from/to
    pub fn date_marker(&self, word: &str) -> Option<&'static str> {
        if ON_DATE.contains(&word) {
            Some("on")
        } else if START_DATE.contains(&word) {
            Some("from")
        } else if END_DATE.contains(&word) {
            Some("to")
        } else {
            None
        }
    }

    pub fn number_word(&self, word: &str) -> Option<i64> {
        self.numbers.get(word).copied()
    }

    pub fn canonical_field(&self, word: &str) -> Option<&str> {
        self.fields.get(word).map(|s| s.as_str())
    }

    pub fn is_priority(&self, word: &str) -> bool {
        self.priorities.iter().any(|p| p == word)
    }

    /// 从指定优先级开始（含）到最高的后缀
    pub fn priorities_at_or_above(&self, value: &str) -> Option<Vec<String>> {
        let idx = self.priorities.iter().position(|p| p == value)?;
        Some(self.priorities[idx..].to_vec())
    }

    /// 从最低到指定优先级（含）的前缀
    pub fn priorities_at_or_below(&self, value: &str) -> Option<Vec<String>> {
        let idx = self.priorities.iter().position(|p| p == value)?;
        Some(self.priorities[..=idx].to_vec())
    }

    pub fn canonical_type(&self, word: &str) -> Option<&str> {
        self.types.get(word).map(|s| s.as_str())
    }

    pub fn is_status(&self, word: &str) -> bool {
        self.statuses.contains(word)
    }

    pub fn is_resolution(&self, word: &str) -> bool {
        self.resolutions.contains(word)
    }

    /// 子词变形 -> 规范子词
    pub fn status_subword(&self, word: &str) -> Option<&str> {
        self.status_subwords.get(word).map(|s| s.as_str())
    }

    /// 子词集合精确匹配完整状态名
    pub fn status_for_subwords(&self, subwords: &BTreeSet<String>) -> Option<&str> {
        if subwords.is_empty() {
            return None;
        }
        self.status_sets.get(subwords).map(|s| s.as_str())
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn components_lower(&self) -> &[String] {
        &self.components_lower
    }

    /// 按占位符编号取回组件原名
    pub fn component_name(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(|s| s.as_str())
    }

    pub fn fixed_queries(&self) -> &[(String, String)] {
        &self.fixed_queries
    }

    pub fn fixed_query_template(&self, index: usize) -> Option<&str> {
        self.fixed_queries.get(index).map(|(_, t)| t.as_str())
    }
}
