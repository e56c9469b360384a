//! The entity keyvalue table: an ordered list of ordered keyvalue bags.
//!
//! The teacher's equivalent type is a plain `HashMap<String, String>`, which
//! cannot preserve key insertion order. GoldSrc re-serialization is stable
//! only if key order survives a round trip, so `Entity` here is backed by an
//! `IndexMap` instead.

use indexmap::IndexMap;

pub type Entity = IndexMap<String, String>;

/// How a caller wants an angular keyvalue (commonly `angles`) interpreted
/// when a model moves or rotates. The table itself is agnostic; the caller
/// picks the behavior appropriate to the entity's classname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleBehavior {
    /// Brush entities: `angles` is a full pitch/yaw/roll rotation.
    Rotate,
    /// Things like `info_landmark`: only yaw is meaningful.
    Directional,
    /// Unknown/point entities where the convention is unclear.
    Ambiguous,
}

/// Read-only collaborator consulted for `get_all_targetnames`. FGD parsing
/// itself is out of scope; callers that have an FGD loaded hand in an
/// implementation of this trait.
pub trait SymbolTable {
    /// Returns true if `key`, on an entity of the given classname, is typed
    /// `target_source` (or a recognized synonym) in the FGD.
    fn is_targetname_key(&self, classname: &str, key: &str) -> bool;
}

/// A `SymbolTable` that treats every key literally named `targetname` as a
/// targetname key, ignoring classname-specific FGD typing. Useful when no
/// FGD is available.
pub struct DefaultSymbolTable;

impl SymbolTable for DefaultSymbolTable {
    fn is_targetname_key(&self, _classname: &str, key: &str) -> bool {
        key == "targetname"
    }
}

#[derive(Debug, Default)]
pub struct EntityTable {
    pub entities: Vec<Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get_keyvalue(&self, entity_idx: usize, key: &str) -> Option<&str> {
        self.entities.get(entity_idx)?.get(key).map(String::as_str)
    }

    pub fn set_or_add_keyvalue(&mut self, entity_idx: usize, key: &str, value: &str) {
        if let Some(entity) = self.entities.get_mut(entity_idx) {
            entity.insert(key.to_string(), value.to_string());
        }
    }

    pub fn remove_keyvalue(&mut self, entity_idx: usize, key: &str) -> Option<String> {
        self.entities.get_mut(entity_idx)?.shift_remove(key)
    }

    /// Renames a key in place, preserving its position in the insertion
    /// order (`IndexMap::insert` on an existing key would instead keep the
    /// old position too, but a plain remove+insert would move it to the
    /// end — this walks the map to splice the rename in place).
    pub fn rename_key(&mut self, entity_idx: usize, old_key: &str, new_key: &str) -> bool {
        let Some(entity) = self.entities.get_mut(entity_idx) else {
            return false;
        };

        let Some(value) = entity.get(old_key).cloned() else {
            return false;
        };

        let rebuilt: Entity = entity
            .iter()
            .map(|(k, v)| {
                if k == old_key {
                    (new_key.to_string(), value.clone())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();

        *entity = rebuilt;
        true
    }

    /// Parses the leading `*N` of a `model` keyvalue into the submodel
    /// index, if present.
    pub fn get_bsp_model_idx(&self, entity_idx: usize) -> Option<usize> {
        let model = self.get_keyvalue(entity_idx, "model")?;
        let digits = model.strip_prefix('*')?;
        digits.parse::<usize>().ok()
    }

    pub fn get_all_targetnames(&self, symbols: &dyn SymbolTable) -> Vec<&str> {
        self.entities
            .iter()
            .filter_map(|entity| {
                let classname = entity.get("classname").map(String::as_str).unwrap_or("");
                entity.iter().find_map(|(k, v)| {
                    symbols
                        .is_targetname_key(classname, k)
                        .then_some(v.as_str())
                })
            })
            .collect()
    }

    pub fn worldspawn_index(&self) -> Option<usize> {
        self.entities
            .iter()
            .position(|e| e.get("classname").map(String::as_str) == Some("worldspawn"))
    }

    /// Serializes back to the entities-lump text grammar: braces separated
    /// by newlines, no trailing newline after the final `}` (a long-observed
    /// engine quirk, preserved rather than "fixed").
    pub fn serialize(&self) -> String {
        let mut out = String::new();

        for (i, entity) in self.entities.iter().enumerate() {
            out.push_str("{\n");
            for (key, value) in entity {
                out.push('"');
                out.push_str(key);
                out.push_str("\" \"");
                out.push_str(value);
                out.push_str("\"\n");
            }
            out.push('}');
            if i + 1 != self.entities.len() {
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table_with(entries: &[&[(&str, &str)]]) -> EntityTable {
        EntityTable {
            entities: entries
                .iter()
                .map(|pairs| pairs.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect())
                .collect(),
        }
    }

    #[test]
    fn preserves_key_insertion_order_on_serialize() {
        let table = table_with(&[&[("classname", "worldspawn"), ("wad", "x.wad"), ("message", "hi")]]);
        let out = table.serialize();
        let wad_pos = out.find("wad").unwrap();
        let message_pos = out.find("message").unwrap();
        assert!(wad_pos < message_pos);
    }

    #[test]
    fn no_trailing_newline_after_final_brace() {
        let table = table_with(&[&[("classname", "worldspawn")]]);
        assert!(table.serialize().ends_with('}'));
    }

    #[test]
    fn get_bsp_model_idx_parses_star_prefix() {
        let table = table_with(&[&[("classname", "func_door"), ("model", "*3")]]);
        assert_eq!(table.get_bsp_model_idx(0), Some(3));
    }

    #[test]
    fn rename_key_preserves_position() {
        let mut table = table_with(&[&[("a", "1"), ("b", "2"), ("c", "3")]]);
        table.rename_key(0, "b", "bb");
        let keys: Vec<_> = table.entities[0].keys().cloned().collect();
        assert_eq!(keys, vec!["a", "bb", "c"]);
    }
}
