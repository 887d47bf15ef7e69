//! 过滤器提取器：在依存子树上运行分类规则链
//!
//! ## 提取流程图
//!
//! ```text
//! extract(root)
//!   └─ walk(token, filter, negates, depth)
//!        ├─ 词元已被消费 → 整棵子树剪枝，直接返回
//!        ├─ 按固定顺序尝试 Rule::CHAIN
//!        │    ├─ 第一条命中的规则修改 filter 并终止本词元的匹配
//!        │    └─ 全部未命中 → 词元进入 extra_tokens（不标记消费）
//!        ├─ 无论规则结果如何，状态子词都收入 status_tokens
//!        ├─ 规则命中 → 标记消费；若否定粘性已激活则翻转 op
//!        ├─ 记录 name/op/value 的来源词元（提交时只消费这三个）
//!        └─ 对每个子节点递归，继承否定粘性，深度加一
//! ```
//!
//! ## 规则优先级（从高到低）
//!
//! 1. 已知字段名           9. 引号字面量
//! 2. 模糊匹配触发词      10. 优先级字面量
//! 3. 否定模糊触发词      11. 工单类型字面量
//! 4. 精确匹配触发词      12. higher/lower 区间展开
//! 5. 否定精确触发词      13. 状态字面量
//! 6. 裸否定词            14. 解决方式字面量
//! 7. 前缀匹配触发词      15. 第一人称代词
//! 8. 组件占位符          16. 兜底取值（排除虚词）
//!                        17. 日期边界词（仅深度 0）
//!
//! 规则表的顺序就是优先级本身，每条规则都可以单独测试。

use std::collections::BTreeSet;

use tracing::debug;

use crate::filter::{negate_op, Filter, FilterValue};
use crate::grammar::Grammar;
use crate::preprocess::{Placeholder, Prepared};
use crate::token::{ParseTree, PosTag, Token, TokenId};

/// 规则求值环境：对单个词元只读的上下文
struct RuleEnv<'a> {
    grammar: &'a Grammar,
    prepared: &'a Prepared,
    user: &'a str,
    depth: usize,
    /// 进入本词元时 name/op/value 是否已全部就位。
    /// 快照语义：本词元自己的修改不影响这个判断。
    full: bool,
}

/// 分类规则。`CHAIN` 的顺序即优先级，首条命中即生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    FieldName,
    PartialOp,
    NegatedPartialOp,
    ExactOp,
    NegatedExactOp,
    BareNegation,
    StartsWithOp,
    EndsWithOp,
    ComponentPlaceholder,
    QuotedLiteral,
    PriorityLiteral,
    TypeLiteral,
    PriorityRange,
    StatusLiteral,
    ResolutionLiteral,
    FirstPersonValue,
    BareValue,
    DateMarker,
}

impl Rule {
    pub const CHAIN: [Rule; 18] = [
        Rule::FieldName,
        Rule::PartialOp,
        Rule::NegatedPartialOp,
        Rule::ExactOp,
        Rule::NegatedExactOp,
        Rule::BareNegation,
        Rule::StartsWithOp,
        Rule::EndsWithOp,
        Rule::ComponentPlaceholder,
        Rule::QuotedLiteral,
        Rule::PriorityLiteral,
        Rule::TypeLiteral,
        Rule::PriorityRange,
        Rule::StatusLiteral,
        Rule::ResolutionLiteral,
        Rule::FirstPersonValue,
        Rule::BareValue,
        Rule::DateMarker,
    ];

    fn matches(&self, tok: &Token, filter: &Filter, env: &RuleEnv) -> bool {
        match self {
            Rule::FieldName => {
                env.grammar.canonical_field(&tok.text).is_some() && filter.name.is_none()
            }
            Rule::PartialOp => env.grammar.is_partial(&tok.lower) && filter.op.is_none(),
            Rule::NegatedPartialOp => {
                env.grammar.is_negated_partial(&tok.lower) && filter.op.is_none()
            }
            Rule::ExactOp => env.grammar.is_exact(&tok.lower) && filter.op.is_none(),
            Rule::NegatedExactOp => {
                env.grammar.is_negated_exact(&tok.lower) && filter.op.is_none()
            }
            Rule::BareNegation => env.grammar.is_negation(&tok.lower) && !filter.negated,
            Rule::StartsWithOp => env.grammar.is_starting(&tok.lower) && filter.op.is_none(),
            Rule::EndsWithOp => env.grammar.is_ending(&tok.lower) && filter.op.is_none(),
            Rule::ComponentPlaceholder => {
                matches!(env.prepared.resolve(&tok.text), Some(Placeholder::Component(_)))
                    && !env.full
            }
            Rule::QuotedLiteral => {
                matches!(env.prepared.resolve(&tok.text), Some(Placeholder::Literal(_)))
            }
            Rule::PriorityLiteral => env.grammar.is_priority(&tok.lower) && !env.full,
            Rule::TypeLiteral => env.grammar.canonical_type(&tok.lower).is_some() && !env.full,
            Rule::PriorityRange => {
                (tok.text == "higher" || tok.text == "lower")
                    && filter.name.as_deref() == Some("priority")
                    && matches!(
                        &filter.value,
                        Some(FilterValue::Single(v)) if env.grammar.is_priority(v)
                    )
            }
            Rule::StatusLiteral => env.grammar.is_status(&tok.lower) && !env.full,
            Rule::ResolutionLiteral => env.grammar.is_resolution(&tok.lower) && !env.full,
            Rule::FirstPersonValue => {
                env.grammar.is_first_person(&tok.lower) && !env.full && filter.value.is_none()
            }
            Rule::BareValue => {
                filter.name.is_some()
                    && filter.op.is_some()
                    && filter.value.is_none()
                    && !matches!(tok.pos, PosTag::Adp | PosTag::Det | PosTag::Punct | PosTag::Conj)
            }
            Rule::DateMarker => env.depth == 0 && env.grammar.date_marker(&tok.text).is_some(),
        }
    }

    /// 执行规则；返回是否从此激活否定粘性
    fn apply(&self, tok: &Token, filter: &mut Filter, env: &RuleEnv) -> bool {
        match self {
            Rule::FieldName => {
                if let Some(field) = env.grammar.canonical_field(&tok.text) {
                    filter.name = Some(field.to_string());
                }
                false
            }
            Rule::PartialOp => {
                filter.op = Some("=~".to_string());
                false
            }
            Rule::NegatedPartialOp => {
                filter.op = Some("=!~".to_string());
                filter.negated = true;
                true
            }
            Rule::ExactOp => {
                filter.op = Some("=".to_string());
                false
            }
            Rule::NegatedExactOp => {
                filter.op = Some("=!".to_string());
                filter.negated = true;
                true
            }
            Rule::BareNegation => {
                filter.negated = true;
                true
            }
            Rule::StartsWithOp => {
                filter.op = Some("=^".to_string());
                false
            }
            Rule::EndsWithOp => {
                filter.op = Some("=$".to_string());
                false
            }
            Rule::ComponentPlaceholder => {
                // 用户把事情变简单了，这是组件过滤
                if let Some(Placeholder::Component(index)) = env.prepared.resolve(&tok.text) {
                    filter.name = Some("component".to_string());
                    if filter.op.is_none() {
                        filter.op = Some("=".to_string());
                    }
                    if let Some(component) = env.grammar.component_name(*index) {
                        filter.value = Some(FilterValue::Single(component.to_string()));
                    }
                }
                false
            }
            Rule::QuotedLiteral => {
                // 引号字面量就是值本身
                if let Some(Placeholder::Literal(text)) = env.prepared.resolve(&tok.text) {
                    filter.value = Some(FilterValue::Single(text.clone()));
                }
                if filter.op.is_none() {
                    filter.op = Some("=".to_string());
                }
                false
            }
            Rule::PriorityLiteral => {
                filter.name = Some("priority".to_string());
                if filter.op.is_none() {
                    filter.op = Some("=".to_string());
                }
                filter.value = Some(FilterValue::Single(tok.text.clone()));
                false
            }
            Rule::TypeLiteral => {
                filter.name = Some("type".to_string());
                if filter.op.is_none() {
                    filter.op = Some("=".to_string());
                }
                if let Some(canonical) = env.grammar.canonical_type(&tok.lower) {
                    filter.value = Some(FilterValue::Single(canonical.to_string()));
                }
                false
            }
            Rule::PriorityRange => {
                // 用户要的是比指定优先级更高（或更低）的全部取值
                if let Some(FilterValue::Single(current)) = filter.value.clone() {
                    let expanded = if tok.text == "higher" {
                        env.grammar.priorities_at_or_above(&current)
                    } else {
                        env.grammar.priorities_at_or_below(&current)
                    };
                    if let Some(values) = expanded {
                        filter.value = Some(FilterValue::List(values));
                    }
                }
                false
            }
            Rule::StatusLiteral => {
                filter.name = Some("status".to_string());
                if filter.op.is_none() {
                    filter.op = Some("=".to_string());
                }
                filter.value = Some(FilterValue::Single(tok.text.clone()));
                false
            }
            Rule::ResolutionLiteral => {
                filter.name = Some("resolution".to_string());
                if filter.op.is_none() {
                    filter.op = Some("=".to_string());
                }
                filter.value = Some(FilterValue::Single(tok.text.clone()));
                false
            }
            Rule::FirstPersonValue => {
                filter.value = Some(FilterValue::Single(env.user.to_string()));
                false
            }
            Rule::BareValue => {
                // name 和 op 都有了，这个词元多半就是值。有风险的假设。
                filter.value = Some(FilterValue::Single(tok.text.clone()));
                false
            }
            Rule::DateMarker => {
                if let Some(marker) = env.grammar.date_marker(&tok.text) {
                    filter.name = Some(marker.to_string());
                }
                false
            }
        }
    }
}

/// 对一次编译共享的提取器：持有语法表、预处理结果与依存树
pub struct FilterExtractor<'a> {
    grammar: &'a Grammar,
    prepared: &'a Prepared,
    tree: &'a ParseTree,
    user: &'a str,
}

impl<'a> FilterExtractor<'a> {
    pub fn new(
        grammar: &'a Grammar,
        prepared: &'a Prepared,
        tree: &'a ParseTree,
        user: &'a str,
    ) -> Self {
        Self {
            grammar,
            prepared,
            tree,
            user,
        }
    }

    /// 以 root 为起点提取一个过滤器。命中规则的词元加入 consumed；
    /// 调用方决定是否把这份消费集提交回全局。
    pub fn extract(&self, root: TokenId, consumed: &mut BTreeSet<TokenId>) -> Filter {
        let mut filter = Filter::default();
        self.walk(root, &mut filter, consumed, false, 0);
        filter
    }

    fn walk(
        &self,
        id: TokenId,
        filter: &mut Filter,
        consumed: &mut BTreeSet<TokenId>,
        mut negates: bool,
        depth: usize,
    ) {
        if consumed.contains(&id) {
            debug!(?id, depth, "词元已消费，跳过子树");
            return;
        }
        let tok = self.tree.get(id);
        let env = RuleEnv {
            grammar: self.grammar,
            prepared: self.prepared,
            user: self.user,
            depth,
            full: filter.is_complete(),
        };
        let before = (filter.name.clone(), filter.op.clone(), filter.value.clone());

        let mut fired = None;
        for rule in Rule::CHAIN {
            if rule.matches(tok, filter, &env) {
                if rule.apply(tok, filter, &env) {
                    negates = true;
                }
                fired = Some(rule);
                break;
            }
        }
        if fired.is_none() {
            filter.extra_tokens.push(id);
        }

        // 状态子词独立于规则结果收集
        if self.grammar.status_subword(&tok.text).is_some() {
            filter.status_tokens.insert(id);
        }

        if fired.is_some() {
            consumed.insert(id);
            // 否定粘性已激活时翻转运算符，至多一次
            if negates {
                if let Some(op) = filter.op.clone() {
                    if !op.contains('!') {
                        filter.op = Some(negate_op(&op));
                    }
                }
            }
        }

        if filter.name != before.0 {
            filter.name_source = Some(id);
        }
        if filter.op != before.1 {
            filter.op_source = Some(id);
        }
        if filter.value != before.2 {
            filter.value_source = Some(id);
        }

        debug!(token = %tok.text, depth, ?fired, ?filter, "规则链结果");

        for child in &self.tree.get(id).children {
            self.walk(*child, filter, consumed, negates, depth + 1);
        }
    }
}

/// 判断词元的直接子节点里是否挂着否定触发词
pub fn is_negated(tree: &ParseTree, id: TokenId, grammar: &Grammar) -> bool {
    tree.has_child_in(id, grammar.negation_words())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::preprocess::prepare;
    use crate::token::TreeBuilder;

    fn grammar() -> Grammar {
        let config = QueryConfig {
            types: vec!["bug".into(), "feature".into(), "task".into()],
            components: vec!["Pyzor".into()],
            statuses: vec!["closed".into(), "assigned_feature".into()],
            ..QueryConfig::default()
        };
        Grammar::new(&config)
    }

    fn extract_one(
        grammar: &Grammar,
        prepared: &Prepared,
        tree: &ParseTree,
        root: TokenId,
    ) -> (Filter, BTreeSet<TokenId>) {
        let extractor = FilterExtractor::new(grammar, prepared, tree, "alex");
        let mut consumed = BTreeSet::new();
        let filter = extractor.extract(root, &mut consumed);
        (filter, consumed)
    }

    #[test]
    fn test_field_synonym_sets_name() {
        let g = grammar();
        let prepared = prepare(&g, "title");
        let mut b = TreeBuilder::new();
        let root = b.token("title", PosTag::Noun);
        let tree = b.build();
        let (filter, consumed) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("summary"));
        assert!(consumed.contains(&root));
    }

    #[test]
    fn test_partial_trigger_sets_op() {
        let g = grammar();
        let prepared = prepare(&g, "like");
        let mut b = TreeBuilder::new();
        let root = b.token("like", PosTag::Verb);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.op.as_deref(), Some("=~"));
        assert!(!filter.negated);
    }

    #[test]
    fn test_negated_partial_trigger() {
        let g = grammar();
        let prepared = prepare(&g, "notin");
        let mut b = TreeBuilder::new();
        let root = b.token("notin", PosTag::Verb);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.op.as_deref(), Some("=!~"));
        assert!(filter.negated);
    }

    #[test]
    fn test_negation_child_flips_status_op() {
        let g = grammar();
        let prepared = prepare(&g, "not closed");
        // closed 为父、not 为子：先产出 status=closed，再被子节点翻转
        let mut b = TreeBuilder::new();
        let neg = b.token("not", PosTag::Part);
        let root = b.token("closed", PosTag::Adj);
        b.attach(neg, root);
        let tree = b.build();
        let (filter, consumed) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("status"));
        assert_eq!(filter.op.as_deref(), Some("=!"));
        assert_eq!(
            filter.value,
            Some(FilterValue::Single("closed".to_string()))
        );
        assert!(consumed.contains(&neg));
        // op 的来源是触发翻转的否定词
        assert_eq!(filter.op_source, Some(neg));
        assert_eq!(filter.name_source, Some(root));
    }

    #[test]
    fn test_negation_is_sticky_down_the_subtree() {
        let g = grammar();
        let prepared = prepare(&g, "notin cc me");
        // notin -> cc -> me 链：否定在链头激活，值在链尾填入
        let mut b = TreeBuilder::new();
        let root = b.token("notin", PosTag::Verb);
        let cc = b.token("cc", PosTag::Noun);
        let me = b.token("me", PosTag::Pron);
        b.attach(cc, root);
        b.attach(me, cc);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("cc"));
        assert_eq!(filter.op.as_deref(), Some("=!~"));
        assert_eq!(filter.value, Some(FilterValue::Single("alex".to_string())));
    }

    #[test]
    fn test_priority_range_expands_upward() {
        let g = grammar();
        let prepared = prepare(&g, "high or higher");
        let mut b = TreeBuilder::new();
        let root = b.token("high", PosTag::Adj);
        let or = b.token("or", PosTag::Conj);
        let higher = b.token("higher", PosTag::Adj);
        b.attach(or, root);
        b.attach(higher, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("priority"));
        assert_eq!(
            filter.value,
            Some(FilterValue::List(vec!["high".into(), "highest".into()]))
        );
        assert_eq!(filter.value_source, Some(higher));
    }

    #[test]
    fn test_priority_range_expands_downward() {
        let g = grammar();
        let prepared = prepare(&g, "normal or lower");
        let mut b = TreeBuilder::new();
        let root = b.token("normal", PosTag::Adj);
        let lower = b.token("lower", PosTag::Adj);
        b.attach(lower, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(
            filter.value,
            Some(FilterValue::List(vec![
                "lowest".into(),
                "low".into(),
                "normal".into()
            ]))
        );
    }

    #[test]
    fn test_bare_value_skips_function_words() {
        let g = grammar();
        let prepared = prepare(&g, "summary is of urgent");
        let mut b = TreeBuilder::new();
        let root = b.token("is", PosTag::Verb);
        let name = b.token("summary", PosTag::Noun);
        let of = b.token("of", PosTag::Adp);
        let value = b.token("urgent", PosTag::Adj);
        b.attach(name, root);
        b.attach(of, root);
        b.attach(value, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("summary"));
        assert_eq!(filter.op.as_deref(), Some("="));
        assert_eq!(filter.value, Some(FilterValue::Single("urgent".into())));
        // 虚词落入 extra_tokens
        assert_eq!(filter.extra_tokens, vec![of]);
    }

    #[test]
    fn test_date_marker_only_at_depth_zero() {
        let g = grammar();
        let prepared = prepare(&g, "from");
        let mut b = TreeBuilder::new();
        let root = b.token("from", PosTag::Adp);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("from"));

        // 深度大于 0 时同一词元只能进 extra_tokens
        let mut b = TreeBuilder::new();
        let head = b.token("week", PosTag::Noun);
        let nested = b.token("from", PosTag::Adp);
        b.attach(nested, head);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, head);
        assert_eq!(filter.name, None);
        assert!(filter.extra_tokens.contains(&nested));
    }

    #[test]
    fn test_consumed_subtree_is_pruned() {
        let g = grammar();
        let prepared = prepare(&g, "bugs closed");
        let mut b = TreeBuilder::new();
        let closed = b.token("closed", PosTag::Adj);
        let root = b.token("bugs", PosTag::Noun);
        b.attach(closed, root);
        let tree = b.build();
        let extractor = FilterExtractor::new(&g, &prepared, &tree, "alex");
        let mut consumed = BTreeSet::new();
        consumed.insert(closed);
        let filter = extractor.extract(root, &mut consumed);
        // closed 已被消费，规则只看到 bugs
        assert_eq!(filter.name.as_deref(), Some("type"));
        assert_eq!(filter.value, Some(FilterValue::Single("bug".into())));
        assert!(filter.status_tokens.is_empty());
    }

    #[test]
    fn test_component_placeholder() {
        let g = grammar();
        let prepared = prepare(&g, "pyzor tickets");
        assert_eq!(prepared.text, "0u9cmp tickets");
        let mut b = TreeBuilder::new();
        let root = b.token("0u9cmp", PosTag::Noun);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.name.as_deref(), Some("component"));
        assert_eq!(filter.op.as_deref(), Some("="));
        assert_eq!(filter.value, Some(FilterValue::Single("Pyzor".into())));
    }

    #[test]
    fn test_quoted_literal_keeps_existing_op() {
        let g = grammar();
        let prepared = prepare(&g, "description like 'release blocked'");
        let mut b = TreeBuilder::new();
        let root = b.token("like", PosTag::Verb);
        let name = b.token("description", PosTag::Noun);
        let lit = b.token("0u9txt", PosTag::Noun);
        b.attach(name, root);
        b.attach(lit, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        assert_eq!(filter.op.as_deref(), Some("=~"));
        assert_eq!(
            filter.value,
            Some(FilterValue::Single("release blocked".into()))
        );
    }

    #[test]
    fn test_status_tokens_collected_alongside_rules() {
        let g = grammar();
        let prepared = prepare(&g, "assigned features");
        let mut b = TreeBuilder::new();
        let assigned = b.token("assigned", PosTag::Adj);
        let root = b.token("features", PosTag::Noun);
        b.attach(assigned, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        // features 既当了类型值，也作为状态子词被记录
        assert_eq!(filter.name.as_deref(), Some("type"));
        assert_eq!(filter.status_tokens.len(), 2);
    }

    #[test]
    fn test_first_person_needs_empty_value() {
        let g = grammar();
        let prepared = prepare(&g, "closed me");
        let mut b = TreeBuilder::new();
        let root = b.token("closed", PosTag::Adj);
        let me = b.token("me", PosTag::Pron);
        b.attach(me, root);
        let tree = b.build();
        let (filter, _) = extract_one(&g, &prepared, &tree, root);
        // closed 已经填了值，me 不能覆盖
        assert_eq!(filter.value, Some(FilterValue::Single("closed".into())));
    }

    #[test]
    fn test_is_negated_checks_direct_children() {
        let g = grammar();
        let mut b = TreeBuilder::new();
        let neg = b.token("not", PosTag::Part);
        let root = b.token("0u9fxq", PosTag::Noun);
        b.attach(neg, root);
        let tree = b.build();
        assert!(is_negated(&tree, root, &g));
        assert!(!is_negated(&tree, neg, &g));
    }
}
