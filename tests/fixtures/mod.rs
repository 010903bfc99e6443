//! Canned media and service payloads shared by the adapter and pipeline tests.
#![allow(dead_code)]

use asset_compliance::models::brand::{BrandColor, BrandGuidelines};
use serde_json::{json, Value};
use uuid::Uuid;

/// Enough of a PNG for content sniffing.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 24]);
    bytes
}

/// MP4 header with an H.264 sample entry.
pub fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomavc1");
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}

/// MP4 header whose video track is HEVC.
pub fn hevc_mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypmp42");
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(b"mp42hvc1");
    bytes.extend_from_slice(&[0u8; 16]);
    bytes
}

pub fn guidelines() -> BrandGuidelines {
    BrandGuidelines {
        brand_id: Uuid::nil(),
        name: "Acme".to_string(),
        industry: Some("Beverages".to_string()),
        color_palette: vec![BrandColor {
            name: Some("Acme Red".to_string()),
            hex: "#D7263D".to_string(),
        }],
        tone_keywords: vec!["playful".to_string(), "confident".to_string()],
        approved_terms: vec!["refreshing".to_string()],
        banned_terms: vec!["cheap".to_string()],
        required_disclaimers: vec!["Drink responsibly".to_string()],
        phonetic_guide: Some("ACK-mee".to_string()),
        logo_guidelines: None,
    }
}

fn passing(notes: &str) -> Value {
    json!({"status": "pass", "notes": notes, "citations": []})
}

/// Vision verdict with every dimension passing and the given classification.
pub fn vision_verdict(classification: &str, confidence: f64) -> Value {
    json!({
        "logo_compliance": passing("Logo placed with correct clear space"),
        "color_compliance": passing("Palette matches Acme Red"),
        "tone_compliance": passing("Playful and confident"),
        "disclaimer_compliance": passing("Drink responsibly shown in end card"),
        "layout_compliance": passing("Balanced layout"),
        "content_type_analysis": {
            "classification": classification,
            "confidence": confidence,
            "signals": {
                "marketing_intent": classification != "Non-Marketing",
                "product_focus": true,
                "call_to_action": false,
                "camera_stability": "handheld",
                "production_quality": "high"
            },
            "reasoning": "Product shown prominently"
        }
    })
}

/// Gemini `generateContent` reply wrapping `text`.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Chat-completions reply wrapping `text`.
pub fn chat_reply(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
    })
}
