//! Mailbox categories used to group messages in the list view

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of categories a message can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    University,
    Action,
    Promotions,
    Social,
    Updates,
    Unsorted,
}

impl Category {
    /// Every category, in rule-priority order (`Unsorted` last)
    pub const ALL: [Category; 6] = [
        Category::University,
        Category::Action,
        Category::Promotions,
        Category::Social,
        Category::Updates,
        Category::Unsorted,
    ];

    /// Stable identifier sent to the web client
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::University => "university",
            Category::Action => "action",
            Category::Promotions => "promotions",
            Category::Social => "social",
            Category::Updates => "updates",
            Category::Unsorted => "unsorted",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
