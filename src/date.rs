//! Date extraction from the tokens no classification rule claimed.
//!
//! Handles three shapes, tried in order:
//! - relative offsets: "3 weeks ago", "last month", "past week"
//! - calendar dates in token order: "july 24", "july 24 2016", "2016/07/24"
//! - the same tokens reversed, to tolerate "24 july" orderings
//!
//! A lone number is refused outright: it is far more likely a ticket id or
//! a priority than a date. Every entry point takes `now` explicitly so
//! results are reproducible under test.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::grammar::Grammar;
use crate::token::{ParseTree, PosTag, TokenId};

/// Try to resolve a single instant from a filter's leftover tokens.
///
/// On success the contributing tokens are added to `consumed`; on failure
/// the set is untouched and the tokens stay available to other rules.
pub fn extract_date(
    tree: &ParseTree,
    grammar: &Grammar,
    extra: &[TokenId],
    consumed: &mut BTreeSet<TokenId>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut stokens: Vec<String> = Vec::new();
    let mut rtokens: Vec<TokenId> = Vec::new();
    let mut ago_tokens: Vec<TokenId> = Vec::new();
    let mut number: Option<i64> = None;
    let mut unit: Option<String> = None;
    let mut ago = false;

    for &id in extra {
        let tok = tree.get(id);
        if tok.pos == PosTag::Conj {
            // a conjunction starts a different filter, stop here
            break;
        }
        if tok.pos == PosTag::Det {
            continue;
        }
        let value = match grammar.number_word(&tok.lower) {
            Some(n) => n.to_string(),
            None => tok.lower.clone(),
        };
        stokens.push(value.clone());
        rtokens.push(id);

        if number.is_none() {
            if let Ok(n) = value.parse::<i64>() {
                number = Some(n);
                ago_tokens.push(id);
                continue;
            }
        }
        if matches!(tok.text.as_str(), "ago" | "last" | "past") && !ago {
            ago = true;
            ago_tokens.push(id);
            continue;
        }
        if unit.is_none() {
            ago_tokens.push(id);
            unit = Some(tok.text.clone());
        }
    }

    if ago {
        // "last week" carries an implicit one
        let count = number.unwrap_or(1);
        if let Some(unit) = &unit {
            debug!(count, unit = %unit, "trying relative date");
            if let Some(resolved) = resolve_relative(count, unit, now) {
                debug!(%resolved, "resolved relative date");
                consumed.extend(ago_tokens.iter().copied());
                return Some(resolved);
            }
        }
    }

    if stokens.len() == 1 && number.is_some() {
        // a lone number is not a date, whatever a parser may think
        return None;
    }

    debug!(?stokens, "trying calendar date");
    if let Some(resolved) = parse_absolute(&stokens, now) {
        debug!(%resolved, "resolved calendar date");
        consumed.extend(rtokens.iter().copied());
        return Some(resolved);
    }

    let reversed: Vec<String> = stokens.iter().rev().cloned().collect();
    debug!(?reversed, "trying reversed calendar date");
    if let Some(resolved) = parse_absolute(&reversed, now) {
        debug!(%resolved, "resolved reversed calendar date");
        consumed.extend(rtokens.iter().copied());
        return Some(resolved);
    }

    None
}

/// Resolve `count` units back from `now`. Units accept a naive plural.
fn resolve_relative(count: i64, unit: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let singular = if unit.len() > 1 {
        unit.strip_suffix('s').unwrap_or(unit)
    } else {
        unit
    };
    match singular {
        "second" | "sec" => now.checked_sub_signed(Duration::try_seconds(count)?),
        "minute" | "min" => now.checked_sub_signed(Duration::try_minutes(count)?),
        "hour" => now.checked_sub_signed(Duration::try_hours(count)?),
        "day" => now.checked_sub_signed(Duration::try_days(count)?),
        "week" => now.checked_sub_signed(Duration::try_weeks(count)?),
        "month" => now.checked_sub_months(Months::new(u32::try_from(count).ok()?)),
        "year" => {
            let months = u32::try_from(count).ok()?.checked_mul(12)?;
            now.checked_sub_months(Months::new(months))
        }
        _ => None,
    }
}

/// Resolve a token sequence as a calendar date.
///
/// A leading month name with a day (and optional year) is handled by
/// hand since it has no year marker; everything else goes through the
/// dateparser crate.
fn parse_absolute(tokens: &[String], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if tokens.is_empty() {
        return None;
    }
    if tokens.len() <= 3 {
        if let Some(month) = month_number(&tokens[0]) {
            if let Some(day) = tokens.get(1).and_then(|d| d.parse::<u32>().ok()) {
                let year = match tokens.get(2) {
                    Some(y) => y.parse::<i32>().ok()?,
                    None => now.year(),
                };
                let date = NaiveDate::from_ymd_opt(year, month, day)?;
                return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
            }
        }
    }
    dateparser::parse(&tokens.join(" ")).ok()
}

fn month_number(name: &str) -> Option<u32> {
    let number = match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::token::TreeBuilder;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, 24, 12, 0, 0).unwrap()
    }

    fn run(words: &[(&str, PosTag)]) -> (Option<DateTime<Utc>>, BTreeSet<TokenId>) {
        let grammar = Grammar::new(&QueryConfig::default());
        let mut b = TreeBuilder::new();
        let ids: Vec<TokenId> = words.iter().map(|(w, pos)| b.token(w, *pos)).collect();
        let tree = b.build();
        let mut consumed = BTreeSet::new();
        let result = extract_date(&tree, &grammar, &ids, &mut consumed, now());
        (result, consumed)
    }

    #[test]
    fn test_relative_weeks_ago() {
        let (result, consumed) = run(&[
            ("3", PosTag::Num),
            ("weeks", PosTag::Noun),
            ("ago", PosTag::Adv),
        ]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-03");
        assert_eq!(consumed.len(), 3);
    }

    #[test]
    fn test_number_words_are_translated() {
        let (result, _) = run(&[
            ("two", PosTag::Num),
            ("days", PosTag::Noun),
            ("ago", PosTag::Adv),
        ]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-22");
    }

    #[test]
    fn test_last_defaults_to_one() {
        let (result, consumed) = run(&[("last", PosTag::Adj), ("week", PosTag::Noun)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-17");
        assert_eq!(consumed.len(), 2);
    }

    #[test]
    fn test_past_month() {
        let (result, _) = run(&[("past", PosTag::Adj), ("month", PosTag::Noun)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-06-24");
    }

    #[test]
    fn test_last_year() {
        let (result, _) = run(&[("last", PosTag::Adj), ("year", PosTag::Noun)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2015-07-24");
    }

    #[test]
    fn test_lone_number_is_refused() {
        let (result, consumed) = run(&[("1234", PosTag::Num)]);
        assert!(result.is_none());
        assert!(consumed.is_empty());
    }

    #[test]
    fn test_month_day_in_order() {
        let (result, consumed) = run(&[("july", PosTag::Noun), ("24", PosTag::Num)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-24");
        assert_eq!(consumed.len(), 2);
    }

    #[test]
    fn test_day_month_reversed() {
        let (result, _) = run(&[("24", PosTag::Num), ("july", PosTag::Noun)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-24");
    }

    #[test]
    fn test_month_day_with_year() {
        let (result, _) = run(&[
            ("july", PosTag::Noun),
            ("24", PosTag::Num),
            ("2014", PosTag::Num),
        ]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2014-07-24");
    }

    #[test]
    fn test_slash_date_single_token() {
        let (result, _) = run(&[("2016/07/24", PosTag::Noun)]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-24");
    }

    #[test]
    fn test_determiners_are_skipped() {
        let (result, consumed) = run(&[
            ("the", PosTag::Det),
            ("last", PosTag::Adj),
            ("week", PosTag::Noun),
        ]);
        assert_eq!(result.unwrap().date_naive().to_string(), "2016-07-17");
        // the determiner itself is not part of the date
        assert_eq!(consumed.len(), 2);
    }

    #[test]
    fn test_conjunction_stops_the_scan() {
        let (result, consumed) = run(&[
            ("july", PosTag::Noun),
            ("and", PosTag::Conj),
            ("24", PosTag::Num),
        ]);
        assert!(result.is_none());
        assert!(consumed.is_empty());
    }

    #[test]
    fn test_unparseable_leaves_tokens_alone() {
        let (result, consumed) = run(&[("metal", PosTag::Noun), ("tickets", PosTag::Noun)]);
        assert!(result.is_none());
        assert!(consumed.is_empty());
    }

    #[test]
    fn test_invalid_calendar_day_fails() {
        let (result, _) = run(&[("february", PosTag::Noun), ("30", PosTag::Num)]);
        assert!(result.is_none());
    }
}
