//! Row models returned by repositories.
//!
//! Keep these structs focused on the data returned by queries.

use chrono::{DateTime, Utc};

/// One row of the `records` table.
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: String,
    pub remote_id: String,
    pub author: String,
    pub author_name: Option<String>,
    pub text: String,
    pub raw_created_at: String,
    pub timestamp: DateTime<Utc>,
    pub visible: bool,
    pub stored_at: DateTime<Utc>,
}
