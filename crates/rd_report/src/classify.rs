//! crates/rd_report/src/classify.rs
//! Product-name → category mapping used to group report lines.
//! The allocation math never looks at categories.

use std::fmt;

use serde::Serialize;

/// Category label. Ordering across a report comes from
/// [`ProductClassifier::categories`], not from this type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Category(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ProductClassifier {
    fn classify(&self, product_name: &str) -> Category;

    /// Every category `classify` may return, in report order.
    fn categories(&self) -> Vec<Category>;
}

pub const OTHER: &str = "other";

/// (category, dosage-form tokens). Whole tokens only; first category with a hit wins.
const KEYWORDS: &[(&str, &[&str])] = &[
    (
        "supply",
        &[
            "gauze", "bandage", "bandages", "glove", "gloves", "mask", "masks", "cotton", "syringe", "syringes",
            "needle", "needles", "plaster", "plasters", "catheter", "catheters",
        ],
    ),
    ("injection", &["inj", "injection", "injectable", "ampoule", "ampoules", "ampul", "amp", "vial", "vials", "infusion"]),
    ("drops", &["drop", "drops", "gtt", "collyre", "collyrium", "eyedrops"]),
    ("syrup", &["syrup", "syrups", "susp", "suspension", "elixir", "sirop"]),
    ("topical", &["cream", "creams", "creme", "crème", "oint", "ointment", "gel", "gels", "lotion", "pommade"]),
    ("capsule", &["cap", "caps", "capsule", "capsules", "gelule", "gelules", "gélule", "gélules"]),
    (
        "tablet",
        &["tab", "tabs", "tablet", "tablets", "comp", "cp", "comprimé", "comprimés", "comprime", "pill", "pills", "lozenge", "lozenges"],
    ),
];

/// Display order of the keyword categories.
const ORDER: &[&str] = &["tablet", "capsule", "syrup", "injection", "topical", "drops", "supply", OTHER];

/// Lower-cased whole-token matching over [`KEYWORDS`].
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl ProductClassifier for KeywordClassifier {
    fn classify(&self, product_name: &str) -> Category {
        let lowered = product_name.to_lowercase();
        let tokens: Vec<&str> = lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();
        for (category, forms) in KEYWORDS {
            if tokens.iter().any(|t| forms.contains(t)) {
                return Category::new(*category);
            }
        }
        Category::new(OTHER)
    }

    fn categories(&self) -> Vec<Category> {
        ORDER.iter().map(|c| Category::new(*c)).collect()
    }
}
