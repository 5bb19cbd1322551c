//! Inverted capability index.
//!
//! Maps whitespace-delimited lowercase tokens to the agents that declared
//! them. Substring queries run in two phases: an ordered exact/prefix scan
//! over the token map retrieves candidates cheaply, and a contains pass
//! catches mid-token substrings ("ener" inside "generation"). The caller
//! confirms true substring matches against the full capability text, which
//! also handles queries that span token boundaries ("code gen").

use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Split capability text into lowercase whitespace-delimited tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Inverted index from capability tokens to agent ids.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    tokens: BTreeMap<String, BTreeSet<Uuid>>,
}

impl CapabilityIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index all tokens of the given capability descriptors for an agent.
    pub fn insert(&mut self, agent_id: Uuid, capabilities: &[String]) {
        for capability in capabilities {
            for token in tokenize(capability) {
                self.tokens.entry(token).or_default().insert(agent_id);
            }
        }
    }

    /// Remove all of an agent's index entries.
    ///
    /// `capabilities` must be the same descriptors the agent was inserted
    /// with; token entries left empty are dropped.
    pub fn remove(&mut self, agent_id: Uuid, capabilities: &[String]) {
        for capability in capabilities {
            for token in tokenize(capability) {
                if let Some(ids) = self.tokens.get_mut(&token) {
                    ids.remove(&agent_id);
                    if ids.is_empty() {
                        self.tokens.remove(&token);
                    }
                }
            }
        }
    }

    /// Candidate agents for a substring query.
    ///
    /// The query is lowercased and tokenized; each query token contributes
    /// the ids of every index token it is a substring of, and the per-token
    /// sets are intersected. An empty or whitespace-only query yields no
    /// candidates. Candidates still need substring confirmation against the
    /// full capability text by the caller.
    pub fn candidates(&self, query: &str) -> BTreeSet<Uuid> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return BTreeSet::new();
        }

        let mut result: Option<BTreeSet<Uuid>> = None;
        for query_token in &query_tokens {
            let mut ids = BTreeSet::new();

            // Fast path: exact and prefix matches via ordered range scan.
            for (token, set) in self.tokens.range(query_token.clone()..) {
                if !token.starts_with(query_token.as_str()) {
                    break;
                }
                ids.extend(set.iter().copied());
            }

            // Mid-token substrings are invisible to the prefix scan.
            for (token, set) in &self.tokens {
                if !token.starts_with(query_token.as_str())
                    && token.contains(query_token.as_str())
                {
                    ids.extend(set.iter().copied());
                }
            }

            result = Some(match result {
                Some(acc) => acc.intersection(&ids).copied().collect(),
                None => ids,
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        result.unwrap_or_default()
    }

    /// Number of distinct tokens currently indexed.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// All tokens that reference the given agent.
    ///
    /// Used to check index/store consistency.
    pub fn tokens_referencing(&self, agent_id: Uuid) -> BTreeSet<String> {
        self.tokens
            .iter()
            .filter(|(_, ids)| ids.contains(&agent_id))
            .map(|(token, _)| token.clone())
            .collect()
    }
}
