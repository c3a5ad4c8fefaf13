use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramMetadata {
    pub program_name: String,
    pub program_description: String,
    /// Lookahead, in days, for the watch list of upcoming due dates.
    pub review_horizon_days: i64,
}

impl Default for ProgramMetadata {
    fn default() -> Self {
        Self {
            program_name: "New Tracking Program".to_string(),
            program_description: "No description".to_string(),
            review_horizon_days: 30,
        }
    }
}
