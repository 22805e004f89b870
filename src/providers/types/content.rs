use serde::{Deserialize, Serialize};
use serde_json::Value;

// Base trait for all content part types
pub trait ContentType: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn to_json(&self) -> Value;
}

// Text segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
}

impl ContentType for Text {
    fn content_type(&self) -> &'static str {
        "text"
    }

    fn to_json(&self) -> Value {
        serde_json::json!({
            "type": self.content_type(),
            "text": self.text,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    #[default]
    Auto,
}

// Image reference, either an http(s) URL or a data: URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default)]
    pub detail: ImageDetail,
}

impl ContentType for ImageUrl {
    fn content_type(&self) -> &'static str {
        "image_url"
    }

    fn to_json(&self) -> Value {
        serde_json::json!({
            "type": self.content_type(),
            "image_url": {
                "url": self.url,
                "detail": self.detail,
            },
        })
    }
}

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text(Text),
    ImageUrl(ImageUrl),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text(Text { text: text.into() })
    }

    pub fn image<S: Into<String>>(url: S, detail: ImageDetail) -> Self {
        ContentPart::ImageUrl(ImageUrl {
            url: url.into(),
            detail,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(t) => Some(&t.text),
            ContentPart::ImageUrl(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ContentPart::Text(t) => t.to_json(),
            ContentPart::ImageUrl(i) => i.to_json(),
        }
    }
}
