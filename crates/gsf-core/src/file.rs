//! File-level metadata: the `head` block contents.
//!
//! A GSF file declares an identity, a creation time, a list of segments and
//! arbitrary string tags before any grain appears. Grains are logically
//! nested under segments by matching `local_id`.

use crate::time::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A segment declaration: the container for grains of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Identifier unique within the file, used by grain blocks.
    pub local_id: u16,
    /// Informational segment identity.
    pub id: Uuid,
    /// Declared grain count, or -1 when unknown at write time.
    pub count: i64,
    /// Arbitrary key/value annotations.
    pub tags: Vec<(String, String)>,
}

impl SegmentInfo {
    pub fn new(local_id: u16, id: Uuid) -> Self {
        Self {
            local_id,
            id,
            count: -1,
            tags: Vec::new(),
        }
    }
}

/// Everything the `head` block declares about a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub id: Uuid,
    pub created: DateTime,
    pub segments: Vec<SegmentInfo>,
    pub tags: Vec<(String, String)>,
}

impl FileHeader {
    /// Looks up a segment declaration by local id.
    pub fn segment(&self, local_id: u16) -> Option<&SegmentInfo> {
        self.segments.iter().find(|s| s.local_id == local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_defaults_to_unknown_count() {
        let seg = SegmentInfo::new(1, Uuid::nil());
        assert_eq!(seg.count, -1);
        assert!(seg.tags.is_empty());
    }

    #[test]
    fn test_segment_lookup() {
        let header = FileHeader {
            id: Uuid::nil(),
            created: DateTime::new(2018, 9, 8, 16, 0, 0),
            segments: vec![SegmentInfo::new(1, Uuid::nil()), SegmentInfo::new(7, Uuid::nil())],
            tags: vec![],
        };
        assert!(header.segment(7).is_some());
        assert!(header.segment(2).is_none());
    }
}
