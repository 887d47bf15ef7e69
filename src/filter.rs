//! 过滤器累加器：遍历依存子树时逐步填充的单一子句表示

use std::collections::BTreeSet;

use crate::token::TokenId;

/// 过滤器的值：标量或展开后的列表
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

/// 遍历一棵子树期间累积的过滤器状态
///
/// `name`/`op`/`value` 三项都填上之后过滤器即告完整；完整之后分类规则
/// 不再覆盖这三项（状态子词仍会继续收集）。
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub name: Option<String>,
    pub op: Option<String>,
    pub value: Option<FilterValue>,
    /// 一旦在路径上看到否定触发词即置位，对子树其余部分保持粘性
    pub negated: bool,
    /// 子树中出现过的状态子词（按词元身份记录）
    pub status_tokens: BTreeSet<TokenId>,
    /// 没有被任何规则认领的词元，保持句子顺序
    pub extra_tokens: Vec<TokenId>,
    /// 最后一次设置各字段的词元，提交时只消费这三个
    pub name_source: Option<TokenId>,
    pub op_source: Option<TokenId>,
    pub value_source: Option<TokenId>,
}

/// 完整过滤器：可以直接产出子句的形态
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedFilter {
    pub name: String,
    pub op: String,
    pub values: Vec<String>,
    /// name/op/value 三项的来源词元
    pub sources: [TokenId; 3],
}

impl Filter {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.op.is_some() && self.value.is_some()
    }

    /// 完整性检查用和类型表达：要么拿到可产出的过滤器，要么什么都没有
    pub fn completed(&self) -> Option<CompletedFilter> {
        match (
            &self.name,
            &self.op,
            &self.value,
            self.name_source,
            self.op_source,
            self.value_source,
        ) {
            (Some(name), Some(op), Some(value), Some(ns), Some(os), Some(vs)) => {
                let values = match value {
                    FilterValue::Single(v) => vec![v.clone()],
                    FilterValue::List(vs) => vs.clone(),
                };
                Some(CompletedFilter {
                    name: name.clone(),
                    op: op.clone(),
                    values,
                    sources: [ns, os, vs],
                })
            }
            _ => None,
        }
    }
}

/// 把运算符翻转为否定形式。已否定的运算符保持不变，绝不双重否定。
pub fn negate_op(op: &str) -> String {
    if op.contains('!') {
        op.to_string()
    } else {
        op.replace('=', "=!")
    }
}
