//! Messages exchanged with peer nodes.

use accord_types::{HashId, ItemResult, NodeInfo};
use serde::{Deserialize, Serialize};

/// A voter's current view of one item, gossiped between peers.
///
/// All five leaf fields (`from`, `item_id`, `result.{state, expires_at,
/// have_copy}`, `request_answer`) must survive encoding bit-equivalently so
/// that mixed implementations interoperate. `request_answer` asks the
/// receiver to reply with its own view; replies that do not request an
/// answer terminate the exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNotification {
    pub from: NodeInfo,
    pub item_id: HashId,
    pub result: ItemResult,
    pub request_answer: bool,
}

impl ItemNotification {
    pub fn new(from: NodeInfo, item_id: HashId, result: ItemResult, request_answer: bool) -> Self {
        Self {
            from,
            item_id,
            result,
            request_answer,
        }
    }
}
