use crate::model::{
    error::{Entity, RatingError, Result},
    structures::{relationship_kind::RelationshipKind, ItemId}
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A comparable recording. `canonical_id` is set only for aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub canonical_id: Option<ItemId>,
    pub created_at: DateTime<Utc>
}

impl Item {
    pub fn is_canonical(&self) -> bool {
        self.canonical_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRelationship {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub kind: RelationshipKind,
    pub created_at: DateTime<Utc>
}

/// Known items and their alias links.
///
/// Aliases are a single hop: an alias always points at a canonical item,
/// which is enforced when the link is made so resolution never walks a chain.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: IndexMap<ItemId, Item>,
    relationships: Vec<ItemRelationship>
}

impl ItemRegistry {
    pub fn new() -> ItemRegistry {
        ItemRegistry::default()
    }

    pub fn from_parts(items: Vec<Item>, relationships: Vec<ItemRelationship>) -> Result<ItemRegistry> {
        let mut registry = ItemRegistry::new();
        for item in items {
            if registry.items.contains_key(&item.id) {
                return Err(RatingError::ConfigurationError(format!("duplicate item {}", item.id)));
            }
            registry.items.insert(item.id, item);
        }

        for item in registry.items.values() {
            if let Some(canonical_id) = item.canonical_id {
                let target = registry.items.get(&canonical_id).ok_or_else(|| {
                    RatingError::ConfigurationError(format!(
                        "item {} is an alias of unknown item {}",
                        item.id, canonical_id
                    ))
                })?;
                if !target.is_canonical() || canonical_id == item.id {
                    return Err(RatingError::ConfigurationError(format!(
                        "item {} is part of an alias chain",
                        item.id
                    )));
                }
            }
        }

        for relationship in &relationships {
            registry.get(relationship.item_a)?;
            registry.get(relationship.item_b)?;
        }
        registry.relationships = relationships;

        Ok(registry)
    }

    pub fn register(&mut self, id: ItemId, title: &str, at: DateTime<Utc>) -> Result<Item> {
        if self.items.contains_key(&id) {
            return Err(RatingError::DuplicateItem(id));
        }

        let item = Item {
            id,
            title: title.to_string(),
            canonical_id: None,
            created_at: at
        };
        self.items.insert(id, item.clone());

        Ok(item)
    }

    pub fn get(&self, id: ItemId) -> Result<&Item> {
        self.items.get(&id).ok_or_else(|| RatingError::not_found(Entity::Item, id))
    }

    pub fn resolve_canonical(&self, id: ItemId) -> Result<ItemId> {
        let item = self.get(id)?;
        Ok(item.canonical_id.unwrap_or(item.id))
    }

    /// Points `alias` at `canonical`. The caller is responsible for the
    /// alias's rating and for checking it has no comparison history.
    pub fn link_as_canonical_alias(&mut self, alias: ItemId, canonical: ItemId) -> Result<()> {
        if alias == canonical {
            return Err(RatingError::InvalidLink(format!("item {} cannot alias itself", alias)));
        }

        let target = self.get(canonical)?;
        if !target.is_canonical() {
            return Err(RatingError::InvalidLink(format!(
                "item {} is itself an alias and cannot be canonical",
                canonical
            )));
        }

        let source = self.get(alias)?;
        match source.canonical_id {
            Some(existing) if existing == canonical => return Ok(()),
            Some(existing) => {
                return Err(RatingError::InvalidLink(format!(
                    "item {} is already an alias of {}",
                    alias, existing
                )))
            }
            None => {}
        }

        if self.items.values().any(|i| i.canonical_id == Some(alias)) {
            return Err(RatingError::InvalidLink(format!(
                "item {} has aliases of its own and cannot become an alias",
                alias
            )));
        }

        if let Some(item) = self.items.get_mut(&alias) {
            item.canonical_id = Some(canonical);
        }

        info!(alias, canonical, "Linked alias");
        Ok(())
    }

    /// Records an informational link between the canonical identities of `a` and `b`.
    pub fn link_other_relationship(
        &mut self,
        a: ItemId,
        b: ItemId,
        kind: RelationshipKind,
        at: DateTime<Utc>
    ) -> Result<ItemRelationship> {
        let item_a = self.resolve_canonical(a)?;
        let item_b = self.resolve_canonical(b)?;

        if item_a == item_b {
            return Err(RatingError::InvalidLink(format!(
                "items {} and {} are the same recording",
                a, b
            )));
        }

        if let Some(existing) = self
            .relationships
            .iter()
            .find(|r| r.item_a == item_a && r.item_b == item_b && r.kind == kind)
        {
            return Ok(existing.clone());
        }

        let relationship = ItemRelationship {
            item_a,
            item_b,
            kind,
            created_at: at
        };
        self.relationships.push(relationship.clone());

        info!(item_a, item_b, kind = %kind, "Linked relationship");
        Ok(relationship)
    }

    pub fn aliases_of(&self, canonical: ItemId) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|i| i.canonical_id == Some(canonical))
            .map(|i| i.id)
            .collect()
    }

    pub fn relationships_for(&self, id: ItemId) -> Vec<ItemRelationship> {
        self.relationships
            .iter()
            .filter(|r| r.item_a == id || r.item_b == id)
            .cloned()
            .collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn relationships(&self) -> &[ItemRelationship] {
        &self.relationships
    }
}
