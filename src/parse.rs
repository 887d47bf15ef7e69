//! A lightweight dependency-parse stand-in.
//!
//! The compiler only needs a modest amount of structure from the parse:
//! negations and modifiers hanging under the word they modify, noun runs
//! grouped into one subtree, verbs heading their arguments, and
//! conjunction members sharing a head. This provider approximates that
//! with word lists and a deterministic attachment pass; it exists so the
//! crate works without an external NLP service, and anything implementing
//! `ParseProvider` can replace it.

use crate::token::{ParseProvider, ParseTree, PosTag, TreeBuilder};

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "all", "some", "any", "each", "every",
];
const PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "you", "your", "we", "us", "our", "it", "its", "he", "she", "they",
    "them", "his", "her", "their",
];
const ADPOSITIONS: &[&str] = &[
    "in", "on", "at", "of", "for", "with", "from", "to", "by", "since", "until", "after",
    "before", "about", "over", "under", "between", "during",
];
const CONJUNCTIONS: &[&str] = &["and", "or", "but", "nor"];
const NEGATIONS: &[&str] = &["no", "not", "never", "none", "n't"];
const VERBS: &[&str] = &[
    "am", "is", "are", "was", "were", "be", "been", "being", "'m", "'re", "'ve", "have", "has",
    "had", "do", "does", "did", "show", "see", "find", "give", "want", "like", "contains",
    "contain", "starts", "start", "begin", "begins", "end", "ends", "equals", "isin", "notin",
    "isnot", "isnotin", "notlike",
];

const CLITICS: &[&str] = &["'m", "'re", "'ve", "'ll", "'d", "'s"];
const PUNCT_CHARS: &str = ",.!?;:";

/// Deterministic rule-based provider. Stateless, share freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicParser;

impl HeuristicParser {
    pub fn new() -> Self {
        Self
    }
}

fn pos_of(word: &str) -> PosTag {
    if word.chars().all(|c| PUNCT_CHARS.contains(c)) {
        PosTag::Punct
    } else if CONJUNCTIONS.contains(&word) {
        PosTag::Conj
    } else if DETERMINERS.contains(&word) {
        PosTag::Det
    } else if NEGATIONS.contains(&word) {
        PosTag::Part
    } else if PRONOUNS.contains(&word) {
        PosTag::Pron
    } else if ADPOSITIONS.contains(&word) {
        PosTag::Adp
    } else if VERBS.contains(&word) {
        PosTag::Verb
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        PosTag::Num
    } else {
        PosTag::Noun
    }
}

fn split_clitic(word: &str) -> Option<usize> {
    for suffix in CLITICS {
        if let Some(stem) = word.strip_suffix(suffix) {
            if !stem.is_empty() {
                return Some(stem.len());
            }
        }
    }
    None
}

fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for raw in text.split_whitespace() {
        let mut word = raw;
        while let Some(c) = word.chars().next().filter(|c| PUNCT_CHARS.contains(*c)) {
            out.push(c.to_string());
            word = &word[c.len_utf8()..];
        }
        let mut trailing = Vec::new();
        while let Some(c) = word.chars().last().filter(|c| PUNCT_CHARS.contains(*c)) {
            trailing.push(c.to_string());
            word = &word[..word.len() - c.len_utf8()];
        }
        if !word.is_empty() {
            if let Some(stem_len) = word.strip_suffix("n't").map(|stem| stem.len()) {
                if stem_len > 0 {
                    out.push(word[..stem_len].to_string());
                    out.push("n't".to_string());
                } else {
                    out.push(word.to_string());
                }
            } else if let Some(at) = split_clitic(word) {
                out.push(word[..at].to_string());
                out.push(word[at..].to_string());
            } else {
                out.push(word.to_string());
            }
        }
        trailing.reverse();
        out.extend(trailing);
    }
    out
}

/// Word classes driving the attachment pass.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Punct,
    Conj,
    /// Determiners, pronouns and negations: attach to the next content word.
    Modifier,
    Adp,
    Verb,
    /// Chainable content: nouns, adjectives, numbers.
    Plain,
}

fn role_of(pos: PosTag) -> Role {
    match pos {
        PosTag::Punct => Role::Punct,
        PosTag::Conj => Role::Conj,
        PosTag::Det | PosTag::Pron | PosTag::Part => Role::Modifier,
        PosTag::Adp => Role::Adp,
        PosTag::Verb => Role::Verb,
        _ => Role::Plain,
    }
}

impl ParseProvider for HeuristicParser {
    fn parse(&self, text: &str) -> ParseTree {
        let words = tokenize(text);
        let n = words.len();
        let pos: Vec<PosTag> = words.iter().map(|w| pos_of(w)).collect();
        let role: Vec<Role> = pos.iter().map(|p| role_of(*p)).collect();

        // The first content word after a conjunction coordinates with the
        // word before it.
        let mut coord = vec![false; n];
        for i in 0..n {
            if role[i] == Role::Conj {
                if let Some(member) = (i + 1..n).find(|&j| !matches!(role[j], Role::Punct | Role::Conj)) {
                    coord[member] = true;
                }
            }
        }

        let first_verb = (0..n).find(|&i| role[i] == Role::Verb);
        let is_head_word = |i: usize| matches!(role[i], Role::Plain | Role::Verb);
        let preceding_head = |i: usize| (0..i).rev().find(|&j| is_head_word(j));
        let nearest_verb = |i: usize| -> Option<usize> {
            let mut best: Option<usize> = None;
            for j in (0..n).filter(|&j| role[j] == Role::Verb) {
                let dist = i.abs_diff(j);
                match best {
                    // ties go to the earlier verb
                    Some(b) if i.abs_diff(b) <= dist => {}
                    _ => best = Some(j),
                }
            }
            best
        };

        let mut parent: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            parent[i] = match role[i] {
                Role::Punct => {
                    if i > 0 {
                        Some(i - 1)
                    } else {
                        (i + 1..n).find(|&j| role[j] != Role::Punct)
                    }
                }
                Role::Conj => preceding_head(i).or_else(|| (i + 1..n).find(|&j| is_head_word(j))),
                Role::Plain if coord[i] => {
                    // hang off the word the conjunction coordinates with
                    let conj = (0..i).rev().find(|&j| role[j] == Role::Conj);
                    conj.and_then(preceding_head)
                }
                Role::Modifier => (i + 1..n)
                    .find(|&j| is_head_word(j))
                    .or_else(|| preceding_head(i)),
                Role::Adp => preceding_head(i).or(first_verb),
                Role::Verb => {
                    if Some(i) == first_verb {
                        None
                    } else {
                        first_verb
                    }
                }
                Role::Plain => {
                    if i + 1 < n && role[i + 1] == Role::Plain && !coord[i + 1] {
                        // rightward chain inside a noun run
                        Some(i + 1)
                    } else {
                        // run head: the object of a leading adposition,
                        // otherwise an argument of the nearest verb
                        let run_start = (0..=i)
                            .rev()
                            .take_while(|&j| role[j] == Role::Plain && !coord[j])
                            .last()
                            .unwrap_or(i);
                        if run_start > 0 && role[run_start - 1] == Role::Adp {
                            Some(run_start - 1)
                        } else {
                            nearest_verb(i)
                        }
                    }
                }
            };
            // never self-attach
            if parent[i] == Some(i) {
                parent[i] = None;
            }
        }

        let mut builder = TreeBuilder::new();
        let ids: Vec<_> = words
            .iter()
            .zip(pos.iter())
            .map(|(w, p)| builder.token(w, *p))
            .collect();
        for i in 0..n {
            if let Some(p) = parent[i] {
                if p != i {
                    builder.attach(ids[i], ids[p]);
                }
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenId;

    fn parse(text: &str) -> ParseTree {
        HeuristicParser::new().parse(text)
    }

    fn find(tree: &ParseTree, text: &str) -> TokenId {
        tree.ids()
            .find(|&id| tree.get(id).text == text)
            .unwrap_or_else(|| panic!("token {text} not found"))
    }

    #[test]
    fn test_tokenize_splits_clitics_and_punctuation() {
        assert_eq!(tokenize("i'm here, now"), vec!["i", "'m", "here", ",", "now"]);
        assert_eq!(tokenize("don't stop"), vec!["do", "n't", "stop"]);
    }

    #[test]
    fn test_negation_attaches_to_following_content_word() {
        let tree = parse("not closed bugs");
        let not = find(&tree, "not");
        let closed = find(&tree, "closed");
        assert_eq!(tree.get(not).parent, Some(closed));
    }

    #[test]
    fn test_negation_skips_possessive_to_reach_head() {
        // "not" must modify the noun, not the pronoun between them
        let tree = parse("not my moshpit");
        let not = find(&tree, "not");
        let my = find(&tree, "my");
        let moshpit = find(&tree, "moshpit");
        assert_eq!(tree.get(not).parent, Some(moshpit));
        assert_eq!(tree.get(my).parent, Some(moshpit));
    }

    #[test]
    fn test_noun_run_chains_rightward() {
        let tree = parse("closed bugs");
        let closed = find(&tree, "closed");
        let bugs = find(&tree, "bugs");
        assert_eq!(tree.get(closed).parent, Some(bugs));
        assert_eq!(tree.get(bugs).parent, None);
    }

    #[test]
    fn test_verb_heads_both_arguments() {
        let tree = parse("owner is alex");
        let is = find(&tree, "is");
        let owner = find(&tree, "owner");
        let alex = find(&tree, "alex");
        assert_eq!(tree.get(is).parent, None);
        assert_eq!(tree.get(owner).parent, Some(is));
        assert_eq!(tree.get(alex).parent, Some(is));
    }

    #[test]
    fn test_later_verbs_attach_to_the_first() {
        let tree = parse("summary starts with tests , owner is alex");
        let starts = find(&tree, "starts");
        let is = find(&tree, "is");
        let owner = find(&tree, "owner");
        assert_eq!(tree.get(starts).parent, None);
        assert_eq!(tree.get(is).parent, Some(starts));
        // arguments pick the nearest verb
        assert_eq!(tree.get(owner).parent, Some(is));
    }

    #[test]
    fn test_adposition_phrase_hangs_off_preceding_word() {
        let tree = parse("tickets from last week");
        let tickets = find(&tree, "tickets");
        let from = find(&tree, "from");
        let week = find(&tree, "week");
        let last = find(&tree, "last");
        assert_eq!(tree.get(from).parent, Some(tickets));
        assert_eq!(tree.get(week).parent, Some(from));
        assert_eq!(tree.get(last).parent, Some(week));
    }

    #[test]
    fn test_sentence_initial_adposition_is_a_root() {
        let tree = parse("from july 24");
        let from = find(&tree, "from");
        let july = find(&tree, "july");
        let day = find(&tree, "24");
        assert_eq!(tree.get(from).parent, None);
        assert_eq!(tree.get(day).parent, Some(from));
        assert_eq!(tree.get(july).parent, Some(day));
    }

    #[test]
    fn test_coordination_members_share_a_head() {
        let tree = parse("high or higher");
        let high = find(&tree, "high");
        let or = find(&tree, "or");
        let higher = find(&tree, "higher");
        assert_eq!(tree.get(high).parent, None);
        assert_eq!(tree.get(or).parent, Some(high));
        assert_eq!(tree.get(higher).parent, Some(high));
    }

    #[test]
    fn test_empty_input_yields_empty_tree() {
        let tree = parse("");
        assert!(tree.is_empty());
    }
}
