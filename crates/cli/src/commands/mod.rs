pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod memory;

use std::path::Path;

use patentrag_core::ConversationTurn;

/// Read a JSON array of `{role, content}` turns, indexing them in file order.
pub async fn load_history(path: &Path) -> Result<Vec<ConversationTurn>, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read history file {}: {e}", path.display()))?;
    let mut turns: Vec<ConversationTurn> = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse history file {}: {e}", path.display()))?;
    for (i, turn) in turns.iter_mut().enumerate() {
        turn.turn_index = i;
    }
    Ok(turns)
}
