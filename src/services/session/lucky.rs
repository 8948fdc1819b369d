// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::default_category_tokens;
use crate::domain::types::Category;
use alloy::primitives::Address;
use rand::Rng;
use std::collections::HashMap;

/// Random target token per category. The draw is sticky: it changes only
/// when the category does, so re-rendering or re-quoting keeps the same pick.
pub struct LuckyPicker<R: Rng> {
    rng: R,
    lists: HashMap<Category, Vec<Address>>,
    current: Option<(Category, Address)>,
}

impl<R: Rng> LuckyPicker<R> {
    /// Built-in lists, with `overrides` replacing whole categories.
    pub fn new(rng: R, overrides: HashMap<Category, Vec<Address>>) -> Self {
        let mut lists: HashMap<Category, Vec<Address>> = Category::ALL
            .iter()
            .map(|c| (*c, default_category_tokens(*c).to_vec()))
            .collect();
        lists.extend(overrides.into_iter().filter(|(_, v)| !v.is_empty()));
        Self {
            rng,
            lists,
            current: None,
        }
    }

    pub fn tokens(&self, category: Category) -> &[Address] {
        self.lists.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// `floor(random() * len)`, clamped for the `random() == 1.0` corner.
    fn draw_index(&mut self, len: usize) -> usize {
        let roll: f64 = self.rng.r#gen();
        ((roll * len as f64).floor() as usize).min(len.saturating_sub(1))
    }

    /// Token for `category`, drawing a new one only on a category change.
    pub fn pick(&mut self, category: Category) -> Option<Address> {
        if let Some((current_category, token)) = self.current
            && current_category == category
        {
            return Some(token);
        }
        let len = self.tokens(category).len();
        if len == 0 {
            self.current = None;
            return None;
        }
        let index = self.draw_index(len);
        let token = self.tokens(category)[index];
        tracing::debug!(target: "lucky", %category, index, token = %format!("{token:#x}"), "lucky pick");
        self.current = Some((category, token));
        Some(token)
    }

    pub fn current(&self) -> Option<(Category, Address)> {
        self.current
    }
}
