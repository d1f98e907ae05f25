// File: modshop-common/src/models/catalog.rs

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Largest price the `NUMERIC(10, 2)` column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Parses an admin-entered price, rounded to centavos the way Postgres
/// rounds `NUMERIC` input.
pub fn parse_price(raw: &str) -> Result<Decimal, Error> {
    let price = Decimal::from_str(raw.trim())
        .map_err(|_| Error::Validation("Invalid price. Please enter a number (e.g. 250.00).".into()))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if price.is_sign_negative() {
        return Err(Error::Validation("Price cannot be negative.".into()));
    }
    if price > MAX_PRICE {
        return Err(Error::Validation(format!("Price cannot be more than {}.", MAX_PRICE)));
    }
    Ok(price)
}

/// A catalog item ("mod") that users can buy.
///
/// `id` is assigned by the admin and is stable; `name` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModItem {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    /// Replacement claims granted per purchase. Snapshotted into each
    /// reference when it is registered.
    pub default_claims_max: i32,
    pub x_coordinate: Option<f64>,
    pub y_coordinate: Option<f64>,
}

/// A mod plus its live count of available accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModListing {
    #[serde(flatten)]
    pub item: ModItem,
    pub stock: i64,
}

/// Which single field of a mod an admin wants to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModField {
    Name,
    Description,
    Price,
    Image,
    Claims,
    XCoordinate,
    YCoordinate,
}

impl ModField {
    pub const CHOICES: &'static str = "'name', 'description', 'price', 'image', 'claims', 'x' or 'y'";

    /// Turns the admin's raw text into a typed update for this field.
    pub fn parse_value(&self, raw: &str) -> Result<ModUpdate, Error> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(Error::Validation(format!("The new {} cannot be empty.", self)));
        }
        match self {
            ModField::Name => Ok(ModUpdate::Name(value.to_string())),
            ModField::Description => Ok(ModUpdate::Description(value.to_string())),
            ModField::Image => Ok(ModUpdate::ImageUrl(value.to_string())),
            ModField::Price => parse_price(value).map(ModUpdate::Price),
            ModField::Claims => {
                let claims = value
                    .parse::<i32>()
                    .map_err(|_| Error::Validation("Invalid number of claims. Please enter a whole number.".into()))?;
                if claims < 0 {
                    return Err(Error::Validation("Claims cannot be negative.".into()));
                }
                Ok(ModUpdate::DefaultClaimsMax(claims))
            }
            ModField::XCoordinate | ModField::YCoordinate => {
                let coord = value
                    .parse::<f64>()
                    .ok()
                    .filter(|c| c.is_finite())
                    .ok_or_else(|| Error::Validation("Invalid coordinate. Please enter a number.".into()))?;
                if *self == ModField::XCoordinate {
                    Ok(ModUpdate::XCoordinate(coord))
                } else {
                    Ok(ModUpdate::YCoordinate(coord))
                }
            }
        }
    }
}

impl fmt::Display for ModField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModField::Name => write!(f, "name"),
            ModField::Description => write!(f, "description"),
            ModField::Price => write!(f, "price"),
            ModField::Image => write!(f, "image"),
            ModField::Claims => write!(f, "claims"),
            ModField::XCoordinate => write!(f, "x coordinate"),
            ModField::YCoordinate => write!(f, "y coordinate"),
        }
    }
}

impl FromStr for ModField {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(ModField::Name),
            "description" => Ok(ModField::Description),
            "price" => Ok(ModField::Price),
            "image" | "image_url" => Ok(ModField::Image),
            "claims" | "default_claims_max" => Ok(ModField::Claims),
            "x" | "x_coordinate" => Ok(ModField::XCoordinate),
            "y" | "y_coordinate" => Ok(ModField::YCoordinate),
            other => Err(Error::Validation(format!("Unknown mod field: {}", other))),
        }
    }
}

/// A single typed column change, used for partial mod updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModUpdate {
    Name(String),
    Description(String),
    Price(Decimal),
    ImageUrl(String),
    DefaultClaimsMax(i32),
    XCoordinate(f64),
    YCoordinate(f64),
}

impl ModUpdate {
    pub fn column(&self) -> &'static str {
        match self {
            ModUpdate::Name(_) => "name",
            ModUpdate::Description(_) => "description",
            ModUpdate::Price(_) => "price",
            ModUpdate::ImageUrl(_) => "image_url",
            ModUpdate::DefaultClaimsMax(_) => "default_claims_max",
            ModUpdate::XCoordinate(_) => "x_coordinate",
            ModUpdate::YCoordinate(_) => "y_coordinate",
        }
    }

    pub fn apply(&self, item: &mut ModItem) {
        match self {
            ModUpdate::Name(v) => item.name = v.clone(),
            ModUpdate::Description(v) => item.description = Some(v.clone()),
            ModUpdate::Price(v) => item.price = *v,
            ModUpdate::ImageUrl(v) => item.image_url = Some(v.clone()),
            ModUpdate::DefaultClaimsMax(v) => item.default_claims_max = *v,
            ModUpdate::XCoordinate(v) => item.x_coordinate = Some(*v),
            ModUpdate::YCoordinate(v) => item.y_coordinate = Some(*v),
        }
    }
}
