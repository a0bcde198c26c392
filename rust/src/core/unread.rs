use std::collections::HashMap;

/// Per-conversation unread counters. A conversation with no entry has zero unread.
#[derive(Debug, Default)]
pub(crate) struct UnreadCounts {
    counts: HashMap<String, u32>,
}

impl UnreadCounts {
    /// Account for one genuinely new message. `active` must be read at ingestion time.
    /// Returns true when the counter moved.
    pub(crate) fn record_new_message(
        &mut self,
        conversation_id: &str,
        active: Option<&str>,
    ) -> bool {
        if active == Some(conversation_id) {
            return false;
        }
        let n = self.counts.entry(conversation_id.to_string()).or_insert(0);
        *n = n.saturating_add(1);
        true
    }

    pub(crate) fn mark_read(&mut self, conversation_id: &str) {
        self.counts.insert(conversation_id.to_string(), 0);
    }

    pub(crate) fn get(&self, conversation_id: &str) -> u32 {
        self.counts.get(conversation_id).copied().unwrap_or(0)
    }

    pub(crate) fn forget(&mut self, conversation_id: &str) {
        self.counts.remove(conversation_id);
    }

    pub(crate) fn clear(&mut self) {
        self.counts.clear();
    }
}
