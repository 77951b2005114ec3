//! Change actions and the verbs that select them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of change a request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Fix,
    Add,
    #[default]
    Update,
    Remove,
    Enhance,
}

impl ChangeAction {
    pub const ALL: [ChangeAction; 5] = [Self::Fix, Self::Add, Self::Update, Self::Remove, Self::Enhance];

    /// Action selected by a single normalized word, if it is a known verb.
    pub fn from_verb(word: &str) -> Option<Self> {
        let action = match word {
            "fix" | "fixes" | "fixed" | "fixing" | "repair" | "repairs" | "repaired" | "repairing" => Self::Fix,
            "add" | "adds" | "added" | "adding" | "create" | "creates" | "created" | "creating" => Self::Add,
            "change" | "changes" | "changed" | "changing" | "update" | "updates" | "updated"
            | "updating" => Self::Update,
            "remove" | "removes" | "removed" | "removing" | "delete" | "deletes" | "deleted"
            | "deleting" => Self::Remove,
            "enhance" | "enhances" | "enhanced" | "enhancing" | "improve" | "improves" | "improved"
            | "improving" => Self::Enhance,
            _ => return None,
        };
        Some(action)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fix => "fix",
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Enhance => "enhance",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == word)
            .or_else(|| Self::from_verb(&word))
            .ok_or_else(|| format!("unknown change action: {}", s))
    }
}
