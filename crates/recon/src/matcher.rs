use serde::Serialize;

use crate::keys::{CompositeKey, KeyIndex};

/// Distinct keys split into the three disjoint groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyPartition {
    /// Authority keys absent on the counterpart side, in authority order.
    pub authority_only: Vec<CompositeKey>,
    /// Counterpart keys absent on the authority side, in counterpart order.
    pub counterpart_only: Vec<CompositeKey>,
    /// Keys on both sides, in authority order.
    pub common: Vec<CompositeKey>,
}

/// Set difference / intersection over the distinct keys of each side.
pub fn partition_keys(authority: &KeyIndex, counterpart: &KeyIndex) -> KeyPartition {
    let mut partition = KeyPartition::default();

    for key in authority.distinct() {
        if counterpart.contains(key) {
            partition.common.push(key.clone());
        } else {
            partition.authority_only.push(key.clone());
        }
    }

    for key in counterpart.distinct() {
        if !authority.contains(key) {
            partition.counterpart_only.push(key.clone());
        }
    }

    partition
}
