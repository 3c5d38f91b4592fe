use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    GetNaked,
    FluffAndFabulous,
    PurrMyBubbles,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown style: {0}")]
pub struct UnknownStyle(pub String);

impl Style {
    /// Bundle order.
    pub const ALL: [Style; 3] = [Style::GetNaked, Style::FluffAndFabulous, Style::PurrMyBubbles];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::GetNaked => "get-naked",
            Style::FluffAndFabulous => "fluff-and-fabulous",
            Style::PurrMyBubbles => "purr-my-bubbles",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Style::GetNaked => "Get Naked",
            Style::FluffAndFabulous => "Fluff & Fabulous",
            Style::PurrMyBubbles => "Purr My Bubbles",
        }
    }

    pub fn tagline(self) -> &'static str {
        match self {
            Style::GetNaked => "Spa day vibes with fluffy towels",
            Style::FluffAndFabulous => "Glamorous bathtub luxury",
            Style::PurrMyBubbles => "Bubble bath fun with rubber duck",
        }
    }

    pub fn default_prompt(self) -> &'static str {
        match self {
            Style::GetNaked => concat!(
                "Transform this into a vintage oil painting of the pet wrapped in a fluffy white towel ",
                "with a towel turban on its head, as if it's fresh out of a spa. Add a marble bathroom ",
                "background with golden candlelight, subtle steam, and a foggy mirror. Soft vintage ",
                "lighting with a cozy, luxurious feel. Keep the pet's face and pose intact."
            ),
            Style::FluffAndFabulous => concat!(
                "Transform this into a vintage oil painting of the pet lounging in a clawfoot bathtub, ",
                "adorned with pearl necklaces, oversized sunglasses, and a martini glass on the edge of ",
                "the tub. The scene should have warm vintage lighting, white marble tiles, and soft pink ",
                "towels nearby. Keep the pet's original face and posture. Subtle glam, no photorealism."
            ),
            Style::PurrMyBubbles => concat!(
                "Transform this into a vintage oil painting of the pet in a bubble bath with paws up, ",
                "surrounded by floating bubbles and a rubber duck. Use a light pastel background with ",
                "golden fixtures and soft candlelight. Add a vintage glow and visible bath foam. Keep ",
                "the pet's real face and expression untouched."
            ),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == value.trim())
            .ok_or_else(|| UnknownStyle(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Single,
    Bundle,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid productType. Use \"single\" or \"bundle\"")]
pub struct UnknownProductType(pub String);

pub struct Product {
    pub name: &'static str,
    pub description: &'static str,
    pub unit_amount: i64,
    pub currency: &'static str,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Single => "single",
            ProductType::Bundle => "bundle",
        }
    }

    pub fn product(self) -> Product {
        match self {
            ProductType::Single => Product {
                name: "Bougie Pet Portrait",
                description: "One AI-generated pet portrait in your chosen style",
                unit_amount: 1200,
                currency: "usd",
            },
            ProductType::Bundle => Product {
                name: "Bougie Bundle (All 3 Styles)",
                description: "Three AI-generated pet portraits in all available styles",
                unit_amount: 2400,
                currency: "usd",
            },
        }
    }

    /// Styles to generate for this purchase, in generation order.
    pub fn styles(self, chosen: Style) -> Vec<Style> {
        match self {
            ProductType::Single => vec![chosen],
            ProductType::Bundle => Style::ALL.to_vec(),
        }
    }
}

impl FromStr for ProductType {
    type Err = UnknownProductType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "single" => Ok(ProductType::Single),
            "bundle" => Ok(ProductType::Bundle),
            other => Err(UnknownProductType(other.to_string())),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
