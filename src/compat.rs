//! Type compatibility
//!
//! A lookup from concrete type name to its ancestor chain (itself first).
//! Compatibility is a table lookup, not a transitive closure: a type is only
//! as compatible as its chain entry says.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::schema::Definition;

/// Which chain wins when the built-in table and extracted definitions disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainAuthority {
    /// Built-in table wins; extracted chains only fill types it lacks
    #[default]
    Table,
    /// Table order first, then any extra ancestors seen in extracted chains
    Merged,
    /// Extracted chains replace table entries
    Extracted,
}

/// Hand-maintained chains for common component types
const BUILTIN_CHAINS: &[&[&str]] = &[
    &["ChatOpenAI", "BaseChatModel", "BaseLanguageModel", "Runnable"],
    &["AzureChatOpenAI", "BaseChatModel", "BaseLanguageModel", "Runnable"],
    &["ChatAnthropic", "BaseChatModel", "BaseLanguageModel", "Runnable"],
    &["ChatOllama", "BaseChatModel", "BaseLanguageModel", "Runnable"],
    &["OpenAI", "BaseLLM", "BaseLanguageModel", "Runnable"],
    &["BufferMemory", "BaseChatMemory", "BaseMemory"],
    &["BufferWindowMemory", "BaseChatMemory", "BaseMemory"],
    &["ConversationSummaryMemory", "BaseChatMemory", "BaseMemory"],
    &["OpenAIEmbeddings", "Embeddings"],
    &["Memory", "VectorStoreRetriever", "BaseRetriever"],
    &["Pinecone", "VectorStoreRetriever", "BaseRetriever"],
    &["RecursiveCharacterTextSplitter", "TextSplitter", "BaseDocumentTransformer", "Runnable"],
    &["Calculator", "Tool", "StructuredTool", "Runnable"],
    &["CustomTool", "Tool", "StructuredTool", "Runnable"],
    &["ChainTool", "DynamicTool", "Tool", "StructuredTool", "Runnable"],
    &["ConversationChain", "LLMChain", "BaseChain", "Runnable"],
    &["LLMChain", "BaseChain", "Runnable"],
    &["ConversationalRetrievalQAChain", "BaseChain", "Runnable"],
    &["AgentExecutor", "BaseChain", "Runnable"],
    &["ChatPromptTemplate", "BaseChatPromptTemplate", "BasePromptTemplate", "Runnable"],
    &["PromptTemplate", "BaseStringPromptTemplate", "BasePromptTemplate", "Runnable"],
    &["InMemoryCache", "BaseCache"],
    &["RedisCache", "BaseCache"],
    &["Document", "json"],
];

/// Concrete type -> ancestor chain
#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    chains: HashMap<String, Vec<String>>,
}

impl TypeResolver {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table
    pub fn builtin() -> Self {
        let mut resolver = Self::new();
        for chain in BUILTIN_CHAINS {
            resolver.insert(chain.iter().map(|s| s.to_string()).collect());
        }
        resolver
    }

    /// Built-in table combined with every definition's output chains
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a Definition>,
        authority: ChainAuthority,
    ) -> Self {
        let mut resolver = Self::builtin();
        for def in definitions {
            for anchor in def.effective_outputs() {
                resolver.absorb(anchor.base_classes, authority);
            }
        }
        resolver
    }

    /// Set a chain, keyed by its first element. Duplicates are dropped.
    pub fn insert(&mut self, chain: Vec<String>) {
        let chain = dedup(chain);
        if let Some(head) = chain.first().cloned() {
            self.chains.insert(head, chain);
        }
    }

    /// Fold an extracted chain into the table under `authority`.
    pub fn absorb(&mut self, chain: Vec<String>, authority: ChainAuthority) {
        let Some(head) = chain.first().cloned() else {
            return;
        };
        match (self.chains.get_mut(&head), authority) {
            (None, _) | (Some(_), ChainAuthority::Extracted) => self.insert(chain),
            (Some(_), ChainAuthority::Table) => {}
            (Some(existing), ChainAuthority::Merged) => {
                for ancestor in chain {
                    if !existing.contains(&ancestor) {
                        existing.push(ancestor);
                    }
                }
            }
        }
    }

    pub fn chain(&self, type_name: &str) -> Option<&[String]> {
        self.chains.get(type_name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Whether an output of `source` may feed an input requiring `required`
    pub fn is_compatible(&self, source: &str, required: &str) -> bool {
        source == required
            || self
                .chain(source)
                .map(|chain| chain.iter().any(|t| t == required))
                .unwrap_or(false)
    }

    /// Input types an output of `output_type` can feed
    pub fn types_accepted_by(&self, output_type: &str) -> Vec<String> {
        match self.chain(output_type) {
            Some(chain) => chain.to_vec(),
            None => vec![output_type.to_string()],
        }
    }

    /// `input_type` itself plus every concrete type whose chain contains it,
    /// sorted after the input type itself
    pub fn types_that_satisfy(&self, input_type: &str) -> Vec<String> {
        let others: BTreeSet<&str> = self
            .chains
            .iter()
            .filter(|(head, chain)| head.as_str() != input_type && chain.iter().any(|t| t == input_type))
            .map(|(head, _)| head.as_str())
            .collect();

        std::iter::once(input_type)
            .chain(others)
            .map(str::to_string)
            .collect()
    }
}

fn dedup(chain: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(chain.len());
    for t in chain {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
