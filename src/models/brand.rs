use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named brand color.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrandColor {
    #[serde(default)]
    pub name: Option<String>,
    pub hex: String,
}

/// Brand guideline document sent to the analysis services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrandGuidelines {
    pub brand_id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub color_palette: Vec<BrandColor>,
    pub tone_keywords: Vec<String>,
    pub approved_terms: Vec<String>,
    pub banned_terms: Vec<String>,
    pub required_disclaimers: Vec<String>,
    pub phonetic_guide: Option<String>,
    pub logo_guidelines: Option<String>,
}

impl BrandGuidelines {
    pub fn has_palette(&self) -> bool {
        self.color_palette.iter().any(|c| !c.hex.trim().is_empty())
    }

    pub fn requires_disclaimers(&self) -> bool {
        self.required_disclaimers.iter().any(|d| !d.trim().is_empty())
    }
}
