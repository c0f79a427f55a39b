//! Static variant catalogue of the print-on-demand t-shirt product.

use std::collections::BTreeMap;

use super::types::VariantCatalog;

pub const TSHIRT_PRODUCT_ID: i64 = 71;
pub const TSHIRT_PRODUCT_NAME: &str = "Unisex Staple T-Shirt";

pub const CATALOG_SIZES: [&str; 5] = ["S", "M", "L", "XL", "2XL"];

/// Colour and the provider variant id of its smallest size. Sizes follow consecutively.
const COLOR_BASE_VARIANTS: [(&str, i64); 5] = [
    ("White", 4011),
    ("Black", 4017),
    ("Navy", 4023),
    ("Red", 4029),
    ("Royal", 4035),
];

pub const DEFAULT_SIZES: [&str; 5] = CATALOG_SIZES;
pub const DEFAULT_COLORS: [&str; 2] = ["Black", "White"];

/// Base price as a share of retail when none is given, in percent.
pub const DEFAULT_BASE_PRICE_PERCENT: i64 = 60;

/// Provider variant id for a colour/size pair.
#[must_use]
pub fn variant_id(color: &str, size: &str) -> Option<i64> {
    let (_, base) = COLOR_BASE_VARIANTS.iter().find(|(c, _)| *c == color)?;
    let offset = CATALOG_SIZES.iter().position(|s| *s == size)?;
    Some(base + offset as i64)
}

#[must_use]
pub fn catalog_colors() -> Vec<String> {
    COLOR_BASE_VARIANTS
        .iter()
        .map(|(c, _)| (*c).to_string())
        .collect()
}

#[must_use]
pub fn variant_catalog() -> VariantCatalog {
    let variants = COLOR_BASE_VARIANTS
        .iter()
        .map(|(color, _)| {
            let sizes = CATALOG_SIZES
                .iter()
                .filter_map(|size| variant_id(color, size).map(|id| ((*size).to_string(), id)))
                .collect::<BTreeMap<_, _>>();
            ((*color).to_string(), sizes)
        })
        .collect();

    VariantCatalog {
        product_id: TSHIRT_PRODUCT_ID,
        product_name: TSHIRT_PRODUCT_NAME.to_string(),
        variants,
        available_colors: catalog_colors(),
        available_sizes: CATALOG_SIZES.iter().map(|s| (*s).to_string()).collect(),
    }
}
