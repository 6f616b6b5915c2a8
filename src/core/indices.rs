use hashbrown::HashMap;

use crate::types::RecordId;

/// Record id to position in the current snapshot.
pub type PositionIndex = HashMap<RecordId, usize>;
