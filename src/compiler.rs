//! Query assembly: merges extracted filters, fixed-query macros, date
//! ranges, status aggregation and domain defaults into the final tracker
//! query string.
//!
//! Compilation is total: whatever the sentence looks like, the result is
//! a (possibly empty, possibly default-only) `&`-joined clause string.
//! The worst outcome is a query that does not express what the user
//! meant, never an error.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Months, Utc};
use tracing::{debug, info};

use crate::date;
use crate::extract::{is_negated, FilterExtractor};
use crate::grammar::Grammar;
use crate::preprocess::{self, Placeholder, Prepared};
use crate::token::{ParseProvider, ParseTree, TokenId};

/// Compiles natural-language sentences against an immutable grammar and
/// a dependency-parse provider.
///
/// The compiler itself holds no per-request state; `compile` may be
/// called concurrently from multiple threads.
pub struct QueryCompiler<P> {
    grammar: Grammar,
    provider: P,
}

impl<P: ParseProvider> QueryCompiler<P> {
    pub fn new(grammar: Grammar, provider: P) -> Self {
        Self { grammar, provider }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Compile a sentence into the tracker's query string.
    pub fn compile(&self, sentence: &str, user: &str) -> String {
        self.compile_at(sentence, user, Utc::now())
    }

    /// Same as `compile` with an explicit clock, for reproducible dates.
    pub fn compile_at(&self, sentence: &str, user: &str, now: DateTime<Utc>) -> String {
        self.compile_clauses_at(sentence, user, now).join("&")
    }

    pub fn compile_clauses(&self, sentence: &str, user: &str) -> Vec<String> {
        self.compile_clauses_at(sentence, user, Utc::now())
    }

    /// Compile into the clause list before joining. Clause order follows
    /// the token scan and is stable for a fixed input.
    pub fn compile_clauses_at(
        &self,
        sentence: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        info!(sentence, user, "processing natural query");
        let prepared = preprocess::prepare(&self.grammar, sentence);
        let tree = self.provider.parse(&prepared.text);
        self.assemble(&prepared, &tree, user, now)
    }

    fn assemble(
        &self,
        prepared: &Prepared,
        tree: &ParseTree,
        user: &str,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let extractor = FilterExtractor::new(&self.grammar, prepared, tree, user);
        let interpolation = Interpolation::new(user, now);

        let mut clauses: Vec<String> = Vec::new();
        let mut consumed: BTreeSet<TokenId> = BTreeSet::new();
        let mut start_time: Option<DateTime<Utc>> = None;
        let mut end_time: Option<DateTime<Utc>> = None;
        let mut changed = false;
        let mut status_provided = false;
        let mut all_provided = false;
        let mut resolution_provided = false;

        for id in tree.ids() {
            if consumed.contains(&id) {
                continue;
            }
            let tok = tree.get(id);
            debug!(token = %tok.text, "checking token");

            if tok.lower == "all" {
                all_provided = true;
            }

            if self.grammar.is_change_modifier(&tok.lower) {
                // a later date range targets the change time instead
                changed = true;
                consumed.insert(id);
                continue;
            }

            if let Some(Placeholder::FixedQuery(index)) = prepared.resolve(&tok.text) {
                if let Some(template) = self.grammar.fixed_query_template(*index) {
                    let rendered = interpolation.render(template);
                    let emitted: Vec<String> = if is_negated(tree, id, &self.grammar) {
                        rendered.split('&').map(flip_clause).collect()
                    } else {
                        vec![rendered]
                    };
                    // a macro can carry its own status or resolution clause
                    for clause in emitted.iter().flat_map(|e| e.split('&')) {
                        if clause.starts_with("status=") {
                            status_provided = true;
                        } else if clause.starts_with("resolution=") {
                            resolution_provided = true;
                        }
                    }
                    debug!(?emitted, "expanded fixed query");
                    clauses.extend(emitted);
                    consumed.insert(id);
                    continue;
                }
            }

            // Extract against a scratch copy; only a successful date
            // resolution commits the whole walk.
            let mut scratch = consumed.clone();
            let filter = extractor.extract(id, &mut scratch);
            debug!(?filter, "resulting filter");

            if let Some(moment) =
                date::extract_date(tree, &self.grammar, &filter.extra_tokens, &mut scratch, now)
            {
                let slot = filter.name.as_deref();
                let accepted = if start_time.is_none() && end_time.is_none() && slot == Some("on")
                {
                    start_time = Some(moment);
                    end_time = Some(moment);
                    true
                } else if start_time.is_none() && (slot.is_none() || slot == Some("from")) {
                    start_time = Some(moment);
                    true
                } else if slot == Some("to") && end_time.is_none() {
                    end_time = Some(moment);
                    true
                } else {
                    false
                };
                if accepted {
                    consumed = scratch;
                    continue;
                }
            }

            let mut processed = false;
            if let Some(done) = filter.completed() {
                for value in &done.values {
                    let value = if value == "me" { user } else { value.as_str() };
                    clauses.push(format!("{}{}{}", done.name, done.op, value));
                }
                // only the tokens that produced name, op and value are
                // spent; the rest stay available to other filters
                consumed.extend(done.sources);
                processed = true;
                if done.name == "status" {
                    status_provided = true;
                } else if done.name == "resolution" {
                    resolution_provided = true;
                }
            }

            // Compound statuses assemble from sub-words spread over the
            // subtree even when no single rule recognized them.
            if filter.name.as_deref() != Some("status") || !processed {
                let mut subwords = BTreeSet::new();
                for &sid in &filter.status_tokens {
                    if let Some(sub) = self.grammar.status_subword(&tree.get(sid).text) {
                        subwords.insert(sub.to_string());
                    }
                }
                if let Some(status) = self.grammar.status_for_subwords(&subwords) {
                    if filter.negated {
                        clauses.push(format!("status=!{status}"));
                    } else {
                        clauses.push(format!("status={status}"));
                    }
                    consumed.extend(filter.status_tokens.iter().copied());
                    status_provided = true;
                    processed = true;
                }
            }

            // Not always right, but good enough.
            if !processed && (tok.lower == "my" || tok.lower == "tome") {
                if is_negated(tree, id, &self.grammar) {
                    clauses.push(format!("owner=!{user}"));
                } else {
                    clauses.push(format!("owner={user}"));
                }
            }
        }

        // More than two date boundaries (say change time and open time at
        // once) would be possible in principle; that is too complex for
        // now, one range clause is emitted.
        if start_time.is_some() || end_time.is_some() {
            let start = start_time
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let end = end_time
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let field = if changed { "changetime" } else { "time" };
            clauses.push(format!("{field}={start}..{end}"));
        }

        if !status_provided && !all_provided && !resolution_provided {
            clauses.push("status=!closed".to_string());
        }

        info!(?clauses, "created query");
        clauses
    }
}

/// Flip every operator in one rendered clause: `=` becomes `=!` and the
/// other way around.
fn flip_clause(clause: &str) -> String {
    if clause.contains("=!") {
        clause.replace("=!", "=")
    } else {
        clause.replace('=', "=!")
    }
}

/// Variables available to fixed-query templates, `%(name)s` style.
struct Interpolation {
    pairs: Vec<(&'static str, String)>,
}

impl Interpolation {
    fn new(user: &str, now: DateTime<Utc>) -> Self {
        let last_month = now.checked_sub_months(Months::new(1)).unwrap_or(now);
        let last_year = now.checked_sub_months(Months::new(12)).unwrap_or(now);
        let yesterday = Duration::try_days(1)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(now);
        Self {
            pairs: vec![
                ("%(user)s", user.to_string()),
                ("%(month)s", now.format("%B").to_string()),
                ("%(year)s", now.format("%Y").to_string()),
                ("%(day)s", now.format("%d").to_string()),
                ("%(last_month)s", last_month.format("%B").to_string()),
                ("%(last_month_year)s", last_month.format("%Y").to_string()),
                ("%(last_year)s", last_year.format("%Y").to_string()),
                ("%(yesterday)s", yesterday.format("%d").to_string()),
            ],
        }
    }

    fn render(&self, template: &str) -> String {
        self.pairs
            .iter()
            .fold(template.to_string(), |acc, (key, value)| {
                acc.replace(key, value)
            })
    }
}
