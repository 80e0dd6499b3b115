//! Rule-based message categorization
//!
//! A message is matched against an ordered table of [`CategoryRule`]s and the
//! first rule that matches decides its [`Category`]. The order is a product
//! priority: institutional and deadline mail must never be shadowed by a
//! provider-assigned label such as `CATEGORY_PROMOTIONS`.
//!
//! Matching is case-insensitive. Subject and snippet are searched together;
//! some rules also look at the sender or Gmail's category labels.

use std::collections::BTreeSet;

use crate::models::Category;

/// Gmail's own category label IDs
pub mod labels {
    pub const PROMOTIONS: &str = "CATEGORY_PROMOTIONS";
    pub const SOCIAL: &str = "CATEGORY_SOCIAL";
    pub const UPDATES: &str = "CATEGORY_UPDATES";
}

const UNIVERSITY_SENDER: &str = "mcmaster";
const UNIVERSITY_TERMS: &[&str] = &["avenue", "mosaic", "macid", "registrar", "midterm", "exam"];
const UNIVERSITY_KEYWORDS: &[&str] = &["Avenue", "Mosaic", "MacID", "Registrar", "Midterm", "Exam"];

const ACTION_TERMS: &[&str] = &["deadline", "due ", "due.", "action item", "submit"];
const ACTION_KEYWORDS: &[&str] = &["Deadline", "Due", "Action item", "Submit"];

const PROMOTION_TERMS: &[&str] = &[
    "sale",
    "discount",
    "offer",
    "% off",
    "free shipping",
    "off everything",
];
const PROMOTION_KEYWORDS: &[&str] = &["Sale", "Discount", "Offer"];

const SOCIAL_SENDERS: &[&str] = &["linkedin", "twitter", "x.com", "facebook", "instagram"];

const UPDATE_TERMS: &[&str] = &["invoice", "statement", "notification", "your order", "shipped"];
const UPDATE_KEYWORDS: &[&str] = &["Invoice", "Statement", "Notification"];

/// Lowercased view of a message that rules inspect
pub struct MessageFeatures<'a> {
    /// `subject + " " + snippet`, lowercased
    text: String,
    /// `From` header, lowercased
    sender: String,
    label_ids: &'a BTreeSet<String>,
}

impl<'a> MessageFeatures<'a> {
    pub fn new(
        subject: &str,
        sender: &str,
        snippet: &str,
        label_ids: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            text: format!("{} {}", subject, snippet).to_lowercase(),
            sender: sender.to_lowercase(),
            label_ids,
        }
    }

    fn text_contains_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.text.contains(t))
    }

    fn sender_contains_any(&self, fragments: &[&str]) -> bool {
        fragments.iter().any(|f| self.sender.contains(f))
    }

    fn has_label(&self, label: &str) -> bool {
        self.label_ids.contains(label)
    }

    /// Canonical keywords that literally appear in the text, or `fallback`
    /// alone when none do
    fn keywords_in_text(&self, canonical: &[&str], fallback: &str) -> Vec<String> {
        let found: Vec<String> = canonical
            .iter()
            .filter(|k| self.text.contains(&k.to_lowercase()))
            .map(|k| k.to_string())
            .collect();

        if found.is_empty() {
            vec![fallback.to_string()]
        } else {
            found
        }
    }
}

/// One entry of the categorization table
pub struct CategoryRule {
    pub category: Category,
    matches: fn(&MessageFeatures<'_>) -> bool,
    keywords: fn(&MessageFeatures<'_>) -> Vec<String>,
}

impl CategoryRule {
    /// Keywords for a message, or `None` if this rule does not apply
    pub fn apply(&self, features: &MessageFeatures<'_>) -> Option<Vec<String>> {
        if (self.matches)(features) {
            Some((self.keywords)(features))
        } else {
            None
        }
    }
}

/// The rule table, evaluated top-down; `Unsorted` is the implicit fallback
pub static RULES: [CategoryRule; 5] = [
    CategoryRule {
        category: Category::University,
        matches: |f| f.sender.contains(UNIVERSITY_SENDER) || f.text_contains_any(UNIVERSITY_TERMS),
        keywords: |f| f.keywords_in_text(UNIVERSITY_KEYWORDS, "University"),
    },
    CategoryRule {
        category: Category::Action,
        matches: |f| f.text_contains_any(ACTION_TERMS),
        keywords: |f| f.keywords_in_text(ACTION_KEYWORDS, "Action Items"),
    },
    CategoryRule {
        category: Category::Promotions,
        matches: |f| f.has_label(labels::PROMOTIONS) || f.text_contains_any(PROMOTION_TERMS),
        keywords: |f| f.keywords_in_text(PROMOTION_KEYWORDS, "Promotions"),
    },
    CategoryRule {
        category: Category::Social,
        matches: |f| f.has_label(labels::SOCIAL) || f.sender_contains_any(SOCIAL_SENDERS),
        keywords: |_| vec!["Social".to_string()],
    },
    CategoryRule {
        category: Category::Updates,
        matches: |f| f.has_label(labels::UPDATES) || f.text_contains_any(UPDATE_TERMS),
        keywords: |f| f.keywords_in_text(UPDATE_KEYWORDS, "Updates"),
    },
];

/// Classify a message into a category and report the keywords that triggered it
///
/// Never fails: a message no rule matches is `Unsorted` with no keywords.
pub fn categorize(
    subject: &str,
    sender: &str,
    snippet: &str,
    label_ids: &BTreeSet<String>,
) -> (Category, Vec<String>) {
    let features = MessageFeatures::new(subject, sender, snippet, label_ids);

    RULES
        .iter()
        .find_map(|rule| rule.apply(&features).map(|kw| (rule.category, kw)))
        .unwrap_or((Category::Unsorted, Vec::new()))
}
