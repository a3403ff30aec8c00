// src/formatter/embeds.rs
//! Embed templates (as stored on connections) and the Discord REST embed
//! schema they render into.

use serde::{Deserialize, Serialize};

// Discord embed limits, in characters.
pub const EMBED_TITLE_LIMIT: usize = 256;
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
pub const EMBED_FIELD_NAME_LIMIT: usize = 256;
pub const EMBED_FIELD_VALUE_LIMIT: usize = 1024;
pub const EMBED_FOOTER_LIMIT: usize = 2048;
pub const EMBED_AUTHOR_LIMIT: usize = 256;
pub const EMBED_MAX_FIELDS: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedTemplate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    /// Template rendered into an ISO 8601 timestamp, e.g. `{{date}}`.
    pub timestamp: Option<String>,
    pub author: Option<EmbedAuthorTemplate>,
    pub footer: Option<EmbedFooterTemplate>,
    pub image: Option<EmbedMediaTemplate>,
    pub thumbnail: Option<EmbedMediaTemplate>,
    pub fields: Vec<EmbedFieldTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedAuthorTemplate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedFooterTemplate {
    pub text: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedMediaTemplate {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedFieldTemplate {
    pub name: String,
    pub value: String,
    pub inline: Option<bool>,
}

/* ----------------------------
Discord REST schema (snake_case)
---------------------------- */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<DiscordEmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<DiscordEmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<DiscordEmbedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<DiscordEmbedMedia>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<DiscordEmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedMedia {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl DiscordEmbed {
    /// Discord rejects embeds without any visible content.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.author.is_none()
            && self.footer.is_none()
            && self.image.is_none()
            && self.thumbnail.is_none()
            && self.fields.is_empty()
    }
}

/// Truncate to at most `max` chars.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => s[..i].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rest_schema_uses_snake_case_icon_urls() {
        let e = DiscordEmbed {
            title: Some("t".into()),
            author: Some(DiscordEmbedAuthor {
                name: "a".into(),
                url: None,
                icon_url: Some("https://i.test/a.png".into()),
            }),
            footer: Some(DiscordEmbedFooter {
                text: "f".into(),
                icon_url: Some("https://i.test/f.png".into()),
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({
                "title": "t",
                "author": { "name": "a", "icon_url": "https://i.test/a.png" },
                "footer": { "text": "f", "icon_url": "https://i.test/f.png" }
            })
        );
    }

    #[test]
    fn templates_read_camel_case() {
        let t: EmbedTemplate = serde_json::from_value(json!({
            "title": "{{title}}",
            "author": { "name": "{{author}}", "iconUrl": "{{icon}}" },
            "fields": [{ "name": "n", "value": "v", "inline": true }]
        }))
        .unwrap();
        assert_eq!(t.author.unwrap().icon_url.as_deref(), Some("{{icon}}"));
        assert_eq!(t.fields[0].inline, Some(true));
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
