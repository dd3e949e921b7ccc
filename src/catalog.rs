//! Canonical category → tag suggestion table
//!
//! Every consumer (composer, `/api/categories`, the seed command) reads
//! this one table. Order is significant: suggestions render in the order
//! listed here.

use serde::Serialize;

/// A category and the tags suggested for it
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Category {
    pub name: &'static str,
    pub tags: &'static [&'static str],
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "বলবিদ্যা",
        tags: &["নিউটনের সূত্র", "গতি", "বল", "ঘর্ষণ", "কাজ ও শক্তি", "ভরবেগ"],
    },
    Category {
        name: "তাপগতিবিদ্যা",
        tags: &["তাপ", "তাপমাত্রা", "এনট্রপি", "আদর্শ গ্যাস"],
    },
    Category {
        name: "তড়িৎচুম্বকত্ব",
        tags: &["তড়িৎ ক্ষেত্র", "চৌম্বক ক্ষেত্র", "তড়িৎ প্রবাহ", "আবেশ"],
    },
    Category {
        name: "আলোকবিজ্ঞান",
        tags: &["প্রতিফলন", "প্রতিসরণ", "লেন্স", "ব্যতিচার"],
    },
    Category {
        name: "তরঙ্গ ও শব্দ",
        tags: &["তরঙ্গ", "শব্দ", "কম্পাঙ্ক", "অনুনাদ"],
    },
    Category {
        name: "আধুনিক পদার্থবিজ্ঞান",
        tags: &["কোয়ান্টাম", "আপেক্ষিকতা", "পরমাণু", "নিউক্লিয়াস"],
    },
];

/// Look up a category by exact name
pub fn category(name: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.name == name)
}

/// Suggested tags for a category (empty for unknown categories)
pub fn suggestions(name: &str) -> &'static [&'static str] {
    category(name).map(|c| c.tags).unwrap_or(&[])
}

impl Category {
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }
}
