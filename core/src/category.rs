//! Merchant category reference data.
//!
//! The dictionary is built once per scan and only read afterwards.
//! A merchant is "consistent" with its declared category code when any
//! word of the category description appears inside the merchant name.

use crate::types::CategoryCode;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CategoryDictionary {
    descriptions: HashMap<CategoryCode, String>,
}

impl CategoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a code. Descriptions are stored lowercase.
    pub fn insert(&mut self, code: CategoryCode, description: &str) {
        self.descriptions.insert(code, description.to_lowercase());
    }

    pub fn description(&self, code: CategoryCode) -> Option<&str> {
        self.descriptions.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// True when the merchant name contains any word of the code's description.
    /// An absent or unknown code can't be validated and counts as invalid.
    pub fn validate(&self, code: Option<CategoryCode>, merchant_name: &str) -> bool {
        let Some(description) = code.and_then(|c| self.description(c)) else {
            return false;
        };
        let name = merchant_name.to_lowercase();
        description.split_whitespace().any(|word| name.contains(word))
    }
}

impl<S: AsRef<str>> FromIterator<(CategoryCode, S)> for CategoryDictionary {
    fn from_iter<I: IntoIterator<Item = (CategoryCode, S)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (code, description) in iter {
            dict.insert(code, description.as_ref());
        }
        dict
    }
}
