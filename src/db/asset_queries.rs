use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::asset::CreativeAsset;
use crate::models::brand::{BrandColor, BrandGuidelines};

/// Get an asset by ID
pub async fn get_asset(pool: &PgPool, asset_id: Uuid) -> Result<Option<CreativeAsset>, sqlx::Error> {
    sqlx::query_as::<_, CreativeAsset>(
        r#"
        SELECT id, campaign_id, storage_path, mime_type, file_size, status, creative_type,
               compliance_score, overall_status, analysis_results, report, created_at, updated_at
        FROM creative_assets
        WHERE id = $1
        "#,
    )
    .bind(asset_id)
    .fetch_optional(pool)
    .await
}

/// Brand guidelines of the brand owning a campaign, or `None` when the
/// campaign is missing or has no brand.
pub async fn get_brand_guidelines_for_campaign(
    pool: &PgPool,
    campaign_id: Uuid,
) -> Result<Option<BrandGuidelines>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT b.id, b.name, b.industry, b.color_palette, b.tone_keywords, b.approved_terms,
               b.banned_terms, b.required_disclaimers, b.phonetic_guide, b.logo_guidelines
        FROM campaigns c
        JOIN brands b ON b.id = c.brand_id
        WHERE c.id = $1
        "#,
    )
    .bind(campaign_id)
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };

    let palette: Json<Vec<BrandColor>> = r.try_get("color_palette")?;
    Ok(Some(BrandGuidelines {
        brand_id: r.try_get("id")?,
        name: r.try_get("name")?,
        industry: r.try_get("industry")?,
        color_palette: palette.0,
        tone_keywords: r.try_get("tone_keywords")?,
        approved_terms: r.try_get("approved_terms")?,
        banned_terms: r.try_get("banned_terms")?,
        required_disclaimers: r.try_get("required_disclaimers")?,
        phonetic_guide: r.try_get("phonetic_guide")?,
        logo_guidelines: r.try_get("logo_guidelines")?,
    }))
}
