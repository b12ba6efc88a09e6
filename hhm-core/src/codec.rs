use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFamilyUpdate {
    pub name: String,
    /// Shortest amount of time this column family's hints may be withheld
    /// before they're considered too stale to bother replaying.
    pub grace_window_secs: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub partition_key: Vec<u8>,
    pub column_families: Vec<ColumnFamilyUpdate>,
}

impl Mutation {
    pub fn is_empty(&self) -> bool {
        self.column_families.is_empty()
    }

    pub fn column_family_count(&self) -> usize {
        self.column_families.len()
    }
}

/// The TTL a hint should be stored with: the minimum grace window across all
/// of its column families, capped by the operator-configured ceiling.
pub fn ttl_for(mutation: &Mutation, global_cap_secs: u64) -> Result<u64, CodecError> {
    let min_grace = mutation
        .column_families
        .iter()
        .map(|cf| cf.grace_window_secs)
        .min()
        .ok_or(CodecError::EmptyMutation)?;

    let ttl = min_grace.min(global_cap_secs);
    if ttl == 0 {
        return Err(CodecError::NonPositiveTtl);
    }
    Ok(ttl)
}

pub fn serialize(mutation: &Mutation) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serialize(mutation)?)
}

pub fn deserialize(
    bytes: &[u8],
    message_version: u32,
    known_families: &std::collections::HashSet<String>,
) -> Result<Mutation, CodecError> {
    if message_version != CURRENT_VERSION {
        return Err(CodecError::UnsupportedVersion(message_version));
    }

    let mutation: Mutation = bincode::deserialize(bytes).map_err(|_| CodecError::Corrupt)?;

    for cf in &mutation.column_families {
        if !known_families.is_empty() && !known_families.contains(&cf.name) {
            return Err(CodecError::UnknownFamily(cf.name.clone()));
        }
    }

    Ok(mutation)
}

/// Drops any column family update whose target table has since been
/// truncated at a wall-clock time at or after this hint was written - replaying
/// it would resurrect data the operator explicitly asked to discard.
pub fn strip_truncated(mutation: Mutation, truncation_cache: &HashMap<String, i64>, writetime_ms: i64) -> Mutation {
    let column_families = mutation
        .column_families
        .into_iter()
        .filter(|cf| match truncation_cache.get(&cf.name) {
            Some(truncated_at) => *truncated_at <= writetime_ms,
            None => true,
        })
        .collect();

    Mutation {
        partition_key: mutation.partition_key,
        column_families,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cf(name: &str, grace: u64) -> ColumnFamilyUpdate {
        ColumnFamilyUpdate {
            name: name.to_string(),
            grace_window_secs: grace,
            payload: vec![1, 2, 3],
        }
    }

    #[test]
    fn ttl_is_capped_by_minimum_grace_window() {
        let mutation = Mutation {
            partition_key: vec![0],
            column_families: vec![cf("a", 600), cf("b", 60)],
        };
        assert_eq!(ttl_for(&mutation, 3600).unwrap(), 60);
    }

    #[test]
    fn ttl_is_capped_by_global_ceiling() {
        let mutation = Mutation {
            partition_key: vec![0],
            column_families: vec![cf("a", 10_000)],
        };
        assert_eq!(ttl_for(&mutation, 3600).unwrap(), 3600);
    }

    #[test]
    fn empty_mutation_has_no_ttl() {
        let mutation = Mutation {
            partition_key: vec![0],
            column_families: vec![],
        };
        assert!(matches!(ttl_for(&mutation, 3600), Err(CodecError::EmptyMutation)));
    }

    #[test]
    fn round_trip_preserves_contents() {
        let mutation = Mutation {
            partition_key: vec![9, 9],
            column_families: vec![cf("a", 600)],
        };
        let bytes = serialize(&mutation).unwrap();
        let known = std::collections::HashSet::from(["a".to_string()]);
        let decoded = deserialize(&bytes, CURRENT_VERSION, &known).unwrap();
        assert_eq!(decoded.partition_key, mutation.partition_key);
        assert_eq!(decoded.column_families.len(), 1);
    }

    #[test]
    fn unknown_column_family_is_rejected() {
        let mutation = Mutation {
            partition_key: vec![9],
            column_families: vec![cf("ghost", 600)],
        };
        let bytes = serialize(&mutation).unwrap();
        let known = std::collections::HashSet::from(["a".to_string()]);
        assert!(matches!(
            deserialize(&bytes, CURRENT_VERSION, &known),
            Err(CodecError::UnknownFamily(_))
        ));
    }

    #[test]
    fn strip_truncated_drops_stale_families() {
        let mutation = Mutation {
            partition_key: vec![0],
            column_families: vec![cf("a", 600), cf("b", 600)],
        };
        let mut truncation = HashMap::new();
        truncation.insert("a".to_string(), 1_000);
        let stripped = strip_truncated(mutation, &truncation, 500);
        assert_eq!(stripped.column_families.len(), 1);
        assert_eq!(stripped.column_families[0].name, "b");
    }

    #[test]
    fn strip_truncated_keeps_family_truncated_at_exactly_writetime() {
        let mutation = Mutation {
            partition_key: vec![0],
            column_families: vec![cf("a", 600)],
        };
        let mut truncation = HashMap::new();
        truncation.insert("a".to_string(), 500);
        let stripped = strip_truncated(mutation, &truncation, 500);
        assert_eq!(stripped.column_families.len(), 1);
    }
}
