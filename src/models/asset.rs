use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a creative asset. Transitions are pending → processing →
/// completed | failed, with failed → pending only on operator resubmission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TryFrom<String> for AssetStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Derived classification of the creative, as reported by the vision service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum CreativeType {
    #[serde(rename = "UGC")]
    #[strum(to_string = "UGC", serialize = "user_generated", serialize = "user-generated")]
    Ugc,
    #[serde(rename = "Branded")]
    #[strum(to_string = "Branded", serialize = "brand")]
    Branded,
    #[serde(rename = "Non-Marketing")]
    #[strum(
        to_string = "Non-Marketing",
        serialize = "non_marketing",
        serialize = "non marketing",
        serialize = "nonmarketing"
    )]
    NonMarketing,
}

impl TryFrom<String> for CreativeType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// Broad media family, decided from the declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Where an analysis service can fetch the asset from.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub url: String,
    pub mime_type: String,
    pub size_bytes: Option<u64>,
}

/// One uploaded creative under compliance review.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreativeAsset {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub storage_path: String,
    pub mime_type: String,
    pub file_size: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: AssetStatus,
    pub creative_type: Option<String>,
    pub compliance_score: Option<i32>,
    pub overall_status: Option<String>,
    pub analysis_results: Option<serde_json::Value>,
    pub report: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
