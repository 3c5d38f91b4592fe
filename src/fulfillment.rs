use serde::Serialize;
use tracing::{info, warn};

use crate::checkout::CheckoutMetadata;
use crate::error::ProviderError;
use crate::generation::ImageGenerator;
use crate::settings::PromptBook;
use crate::styles::Style;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPortrait {
    pub style: Style,
    pub image_url: String,
    pub display_name: &'static str,
}

pub async fn generate_portrait(
    generator: &dyn ImageGenerator,
    prompts: &PromptBook,
    image_url: &str,
    style: Style,
) -> Result<GeneratedPortrait, ProviderError> {
    let prompt = prompts.prompt_for(style);
    let image = generator.edit(image_url, prompt).await?;
    Ok(GeneratedPortrait {
        style,
        image_url: image.url,
        display_name: style.display_name(),
    })
}

/// Generates every portrait a paid checkout is owed.
///
/// Bundles run one style at a time in [`Style::ALL`] order. The first
/// failure aborts the run and discards anything already generated.
pub async fn fulfill(
    generator: &dyn ImageGenerator,
    prompts: &PromptBook,
    metadata: &CheckoutMetadata,
) -> Result<Vec<GeneratedPortrait>, ProviderError> {
    let styles = metadata.product_type.styles(metadata.style);
    let mut portraits = Vec::with_capacity(styles.len());
    for style in styles {
        match generate_portrait(generator, prompts, &metadata.image_url, style).await {
            Ok(portrait) => portraits.push(portrait),
            Err(err) => {
                warn!(style = %style, error = %err, "generation failed, aborting fulfillment");
                return Err(err);
            }
        }
    }
    info!(
        product_type = %metadata.product_type,
        count = portraits.len(),
        "fulfillment complete"
    );
    Ok(portraits)
}
