use serde::{Deserialize, Serialize};

/// Relayed between websocket clients as-is; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingSignal {
    pub channel: String,
    pub admin_id: String,
    pub typing: bool,
}
