//! Prose front door: turns a change description into an intent.
//!
//! The parser is a best-effort keyword heuristic. Callers that already know
//! what they want to change build a [`ChangeRequest`] directly.

mod action;
mod parser;
mod vocabulary;

pub use action::ChangeAction;
pub use parser::{ChangeRequest, Intent, IntentParser};
pub use vocabulary::{Vocabulary, VocabularyError, VocabularyNode};
