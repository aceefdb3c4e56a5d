//! Article code -> target catalog item, built once per batch.

use std::collections::HashMap;

use osync_schemas::{CatalogEntry, EntityRef, PurchasePosition, SourcePosition};

use crate::SyncError;

#[derive(Debug, Clone, Default)]
pub struct CatalogMapping {
    by_article: HashMap<String, EntityRef>,
}

impl CatalogMapping {
    /// Entries with a blank article are skipped. On duplicate articles the
    /// first entry wins.
    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        let mut by_article = HashMap::with_capacity(entries.len());
        for e in entries {
            let Some(article) = e.article.as_deref().map(str::trim).filter(|a| !a.is_empty())
            else {
                continue;
            };
            by_article
                .entry(article.to_string())
                .or_insert_with(|| e.item.clone());
        }
        Self { by_article }
    }

    pub fn len(&self) -> usize {
        self.by_article.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_article.is_empty()
    }

    pub fn get(&self, article: &str) -> Option<&EntityRef> {
        self.by_article.get(article.trim())
    }

    /// Map every source position to a target line.
    ///
    /// All positions are checked before returning; malformed values win over
    /// missing articles so the order goes to FAILED rather than looping.
    pub fn resolve(&self, positions: &[SourcePosition]) -> Result<Vec<PurchasePosition>, SyncError> {
        let mut lines = Vec::with_capacity(positions.len());
        let mut malformed = Vec::new();
        let mut unresolved = Vec::new();

        for (idx, p) in positions.iter().enumerate() {
            if !p.quantity.is_finite() || p.quantity <= 0.0 {
                malformed.push(format!("position {}: invalid quantity {}", idx + 1, p.quantity));
                continue;
            }
            if p.price < 0 {
                malformed.push(format!("position {}: negative price {}", idx + 1, p.price));
                continue;
            }

            let article = p.article.as_deref().map(str::trim).unwrap_or("");
            if article.is_empty() {
                unresolved.push(format!(
                    "position {}: item {} has no article code",
                    idx + 1,
                    p.assortment.href
                ));
                continue;
            }

            match self.get(article) {
                Some(item) => lines.push(PurchasePosition {
                    quantity: p.quantity,
                    price: p.price,
                    assortment: item.clone(),
                }),
                None => unresolved.push(format!("article '{article}' not found in target catalog")),
            }
        }

        if !malformed.is_empty() {
            return Err(SyncError::Malformed(malformed.join("; ")));
        }
        if !unresolved.is_empty() {
            return Err(SyncError::Unresolvable(unresolved));
        }
        Ok(lines)
    }
}
