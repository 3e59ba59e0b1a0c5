//! Prompt context assembly.
//!
//! Turns a loaded [`Knowledge`](sqlkeeper_core::Knowledge) value into the
//! single text block an LLM agent receives, trimmed to a token budget.

pub mod assembler;
pub mod token;

pub use assembler::{
    AssembledContext, AssemblyError, AssemblyMetadata, ContextAssembler, DropInfo, ItemKind,
    KindStats,
};
pub use token::estimate_tokens;
