//! Chain abstraction and sequential composition.
//!
//! A chain declares the fields it reads and the fields it produces.
//! `SequentialChain::new` checks those declarations once, when stages are
//! wired together, so an invocation never discovers a wiring mistake halfway.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::errors::{BotError, Result};

/// Named string fields passed between chains
pub type FieldMap = HashMap<String, String>;

/// Look up a required field
pub fn require<'a>(fields: &'a FieldMap, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| BotError::MissingField(key.to_string()))
}

/// A pipeline stage with declared inputs and outputs
#[async_trait]
pub trait Chain: Send + Sync {
    /// Name used in logs and composition errors
    fn name(&self) -> &str;

    /// Fields this chain reads
    fn input_keys(&self) -> Vec<&str>;

    /// Fields this chain adds
    fn output_keys(&self) -> Vec<&str>;

    /// Run the chain. The returned map holds exactly `output_keys`.
    async fn call(&self, inputs: &FieldMap) -> Result<FieldMap>;
}

/// Runs chains in order, feeding each the accumulated fields
pub struct SequentialChain {
    chains: Vec<Box<dyn Chain>>,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
}

impl SequentialChain {
    /// Compose `chains`, given the fields the caller will supply.
    ///
    /// Fails with `Composition` when a chain reads a field that neither the
    /// caller nor an earlier chain provides, or writes a field that already
    /// exists.
    pub fn new(chains: Vec<Box<dyn Chain>>, input_keys: &[&str]) -> Result<Self> {
        if chains.is_empty() {
            return Err(BotError::Composition(
                "a sequential chain needs at least one stage".to_string(),
            ));
        }

        let mut known: HashSet<String> = input_keys.iter().map(|k| k.to_string()).collect();
        let mut output_keys = Vec::new();

        for chain in &chains {
            let missing: Vec<&str> = chain
                .input_keys()
                .into_iter()
                .filter(|key| !known.contains(*key))
                .collect();

            if !missing.is_empty() {
                return Err(BotError::Composition(format!(
                    "chain '{}' reads {:?}, which no caller input or earlier chain provides",
                    chain.name(),
                    missing
                )));
            }

            for key in chain.output_keys() {
                if !known.insert(key.to_string()) {
                    return Err(BotError::Composition(format!(
                        "chain '{}' writes '{}', which already exists",
                        chain.name(),
                        key
                    )));
                }
                output_keys.push(key.to_string());
            }
        }

        Ok(Self {
            chains,
            input_keys: input_keys.iter().map(|k| k.to_string()).collect(),
            output_keys,
        })
    }

    /// Run every stage and return caller inputs plus all produced fields
    pub async fn run(&self, inputs: &FieldMap) -> Result<FieldMap> {
        for key in &self.input_keys {
            require(inputs, key)?;
        }

        let mut fields = inputs.clone();
        for chain in &self.chains {
            debug!(chain = chain.name(), "running chain");
            let outputs = chain.call(&fields).await?;

            for key in chain.output_keys() {
                if !outputs.contains_key(key) {
                    return Err(BotError::Composition(format!(
                        "chain '{}' did not produce '{}'",
                        chain.name(),
                        key
                    )));
                }
            }
            fields.extend(outputs);
        }

        Ok(fields)
    }

    /// Names of the composed chains, in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.chains.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl Chain for SequentialChain {
    fn name(&self) -> &str {
        "sequential"
    }

    fn input_keys(&self) -> Vec<&str> {
        self.input_keys.iter().map(String::as_str).collect()
    }

    fn output_keys(&self) -> Vec<&str> {
        self.output_keys.iter().map(String::as_str).collect()
    }

    async fn call(&self, inputs: &FieldMap) -> Result<FieldMap> {
        let mut fields = self.run(inputs).await?;
        Ok(self
            .output_keys
            .iter()
            .filter_map(|key| fields.remove_entry(key))
            .collect())
    }
}
