use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{ConfigStore, StoreError};
use crate::styles::{Style, UnknownStyle};

pub const PROMPTS_KEY: &str = "prompts";
pub const SITE_CONTENT_KEY: &str = "site-content";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error(transparent)]
    UnknownStyle(#[from] UnknownStyle),
    #[error("prompt for {0} must not be empty")]
    Empty(Style),
}

/// Instruction text sent to the image generator for each style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptBook {
    prompts: BTreeMap<Style, String>,
}

impl Default for PromptBook {
    fn default() -> Self {
        let prompts = Style::ALL
            .into_iter()
            .map(|style| (style, style.default_prompt().to_string()))
            .collect();
        Self { prompts }
    }
}

impl PromptBook {
    /// Validates admin supplied entries. Keys must be known style ids and
    /// values non-empty text.
    pub fn from_entries(entries: BTreeMap<String, String>) -> Result<Self, PromptError> {
        let mut prompts = BTreeMap::new();
        for (key, value) in entries {
            let style: Style = key.parse()?;
            let value = value.trim();
            if value.is_empty() {
                return Err(PromptError::Empty(style));
            }
            prompts.insert(style, value.to_string());
        }
        Ok(Self { prompts })
    }

    /// Stored entries layered over the defaults. Unknown or blank entries are
    /// dropped.
    fn merged_over_defaults(stored: BTreeMap<String, String>) -> Self {
        let mut book = Self::default();
        for (key, value) in stored {
            match key.parse::<Style>() {
                Ok(style) if !value.trim().is_empty() => {
                    book.prompts.insert(style, value);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "ignoring stored prompt"),
            }
        }
        book
    }

    pub fn prompt_for(&self, style: Style) -> &str {
        self.prompts
            .get(&style)
            .map(String::as_str)
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or_else(|| style.default_prompt())
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteContent {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub logo: String,
    pub hero_image: String,
    pub style_names: BTreeMap<String, String>,
    pub style_descriptions: BTreeMap<String, String>,
}

impl Default for SiteContent {
    fn default() -> Self {
        Self {
            hero_title: "Transform Your Pet Into Art".to_string(),
            hero_subtitle: "Upload your pet's photo and choose from our vintage-inspired styles"
                .to_string(),
            logo: "/images/logo.png".to_string(),
            hero_image: "/images/hero-banner.jpg".to_string(),
            style_names: Style::ALL
                .into_iter()
                .map(|style| (style.as_str().to_string(), style.display_name().to_string()))
                .collect(),
            style_descriptions: Style::ALL
                .into_iter()
                .map(|style| (style.as_str().to_string(), style.tagline().to_string()))
                .collect(),
        }
    }
}

pub async fn load_prompts(store: &dyn ConfigStore) -> Result<PromptBook, StoreError> {
    if let Some(bytes) = store.get(PROMPTS_KEY).await? {
        match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
            Ok(stored) => return Ok(PromptBook::merged_over_defaults(stored)),
            Err(err) => warn!(error = %err, "stored prompts are unreadable, restoring defaults"),
        }
    }
    let defaults = PromptBook::default();
    save_prompts(store, &defaults).await?;
    info!("wrote default prompts");
    Ok(defaults)
}

pub async fn save_prompts(store: &dyn ConfigStore, prompts: &PromptBook) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(prompts)?;
    store.put(PROMPTS_KEY, &payload).await
}

pub async fn load_site_content(store: &dyn ConfigStore) -> Result<SiteContent, StoreError> {
    if let Some(bytes) = store.get(SITE_CONTENT_KEY).await? {
        match serde_json::from_slice::<SiteContent>(&bytes) {
            Ok(content) => return Ok(content),
            Err(err) => warn!(error = %err, "stored site content is unreadable, restoring defaults"),
        }
    }
    let defaults = SiteContent::default();
    save_site_content(store, &defaults).await?;
    info!("wrote default site content");
    Ok(defaults)
}

pub async fn save_site_content(
    store: &dyn ConfigStore,
    content: &SiteContent,
) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(content)?;
    store.put(SITE_CONTENT_KEY, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    #[tokio::test]
    async fn missing_prompts_are_seeded_with_defaults() {
        let store = MemoryConfigStore::new();
        let book = load_prompts(&store).await.unwrap();
        assert_eq!(book, PromptBook::default());
        assert!(store.get(PROMPTS_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stored_prompts_override_defaults() {
        let store = MemoryConfigStore::new();
        store
            .put(PROMPTS_KEY, br#"{"get-naked":"Paint it blue","stay-classy":"ignored"}"#)
            .await
            .unwrap();
        let book = load_prompts(&store).await.unwrap();
        assert_eq!(book.prompt_for(Style::GetNaked), "Paint it blue");
        assert_eq!(
            book.prompt_for(Style::PurrMyBubbles),
            Style::PurrMyBubbles.default_prompt()
        );
        assert_eq!(book.len(), 3);
    }

    #[tokio::test]
    async fn save_overwrites_wholesale() {
        let store = MemoryConfigStore::new();
        let mut entries = BTreeMap::new();
        entries.insert("purr-my-bubbles".to_string(), "Bubbles!".to_string());
        let book = PromptBook::from_entries(entries).unwrap();
        save_prompts(&store, &book).await.unwrap();

        let raw = store.get(PROMPTS_KEY).await.unwrap().unwrap();
        let stored: BTreeMap<String, String> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored["purr-my-bubbles"], "Bubbles!");
    }

    #[test]
    fn from_entries_validates() {
        let mut unknown = BTreeMap::new();
        unknown.insert("stay-classy".to_string(), "x".to_string());
        assert!(matches!(
            PromptBook::from_entries(unknown),
            Err(PromptError::UnknownStyle(_))
        ));

        let mut blank = BTreeMap::new();
        blank.insert("get-naked".to_string(), "   ".to_string());
        assert_eq!(
            PromptBook::from_entries(blank),
            Err(PromptError::Empty(Style::GetNaked))
        );
    }

    #[tokio::test]
    async fn partial_site_content_keeps_defaults() {
        let store = MemoryConfigStore::new();
        store
            .put(SITE_CONTENT_KEY, br#"{"heroTitle":"Pets, but fancy"}"#)
            .await
            .unwrap();
        let content = load_site_content(&store).await.unwrap();
        assert_eq!(content.hero_title, "Pets, but fancy");
        assert_eq!(content.logo, "/images/logo.png");
        assert_eq!(content.style_names["fluff-and-fabulous"], "Fluff & Fabulous");
    }

    #[tokio::test]
    async fn corrupt_site_content_is_restored() {
        let store = MemoryConfigStore::new();
        store.put(SITE_CONTENT_KEY, b"not json").await.unwrap();
        let content = load_site_content(&store).await.unwrap();
        assert_eq!(content, SiteContent::default());
        let raw = store.get(SITE_CONTENT_KEY).await.unwrap().unwrap();
        assert!(serde_json::from_slice::<SiteContent>(&raw).is_ok());
    }
}
