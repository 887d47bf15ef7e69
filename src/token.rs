//! The token model for dependency-parsed sentences.

/// Coarse part-of-speech tag carried by a parsed token.
///
/// Only a handful of tags influence classification (`Det`, `Adp`,
/// `Conj`, `Punct`); the rest exist so providers can report what they
/// saw without forcing everything into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    Noun,
    Verb,
    Adj,
    Adv,
    Pron,
    Det,
    Adp,
    Num,
    Conj,
    Part,
    Punct,
    Other,
}

/// Index of a token inside its `ParseTree`.
///
/// Two tokens with identical text at different tree positions are
/// distinct; identity is the index, never the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(pub usize);

/// One node of the dependency tree.
#[derive(Debug, Clone)]
pub struct Token {
    /// The spelling as produced by the provider.
    pub text: String,
    /// Lower-cased spelling, precomputed for table lookups.
    pub lower: String,
    pub pos: PosTag,
    pub parent: Option<TokenId>,
    /// Syntactic children, in sentence order.
    pub children: Vec<TokenId>,
}

/// A parsed sentence: tokens in sentence order, linked into a tree.
#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    tokens: Vec<Token>,
}

impl ParseTree {
    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.0]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token ids in sentence order.
    pub fn ids(&self) -> impl Iterator<Item = TokenId> {
        (0..self.tokens.len()).map(TokenId)
    }

    /// True when any direct child of `id` has one of the given lower-case
    /// spellings.
    pub fn has_child_in(
        &self,
        id: TokenId,
        words: &std::collections::HashSet<&'static str>,
    ) -> bool {
        self.get(id)
            .children
            .iter()
            .any(|c| words.contains(self.get(*c).lower.as_str()))
    }
}

/// Incrementally assembles a `ParseTree`.
///
/// Providers (and tests) append tokens in sentence order, then link them
/// with `attach`; unlinked tokens stay roots.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tokens: Vec<Token>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&mut self, text: &str, pos: PosTag) -> TokenId {
        let id = TokenId(self.tokens.len());
        self.tokens.push(Token {
            text: text.to_string(),
            lower: text.to_lowercase(),
            pos,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Links `child` under `parent`. Children accumulate in call order,
    /// so callers attach in sentence order.
    pub fn attach(&mut self, child: TokenId, parent: TokenId) {
        self.tokens[child.0].parent = Some(parent);
        self.tokens[parent.0].children.push(child);
    }

    pub fn build(self) -> ParseTree {
        ParseTree { tokens: self.tokens }
    }
}

/// Something that turns preprocessed text into a dependency tree.
///
/// The compiler treats the provider as a deterministic black box; the
/// crate ships a heuristic one, production setups may wire an external
/// NLP service instead.
pub trait ParseProvider {
    fn parse(&self, text: &str) -> ParseTree;
}
