//! Cart lines and the uniqueness-preserving cart collection.
//!
//! A [`Cart`] never holds two lines with the same [`LineKey`]; adding a line
//! whose `(product_id, size)` pair already exists increments the existing
//! line's quantity instead. Every constructor that accepts externally
//! supplied lines re-establishes that invariant.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Money;

/// One purchasable line in a cart.
///
/// `unit_price`, `display_name` and `image_ref` are snapshots taken when the
/// line was added; they are never refreshed from the catalog.
///
/// Older cart documents used `id`, `price`, `name` and `image`; those names
/// are accepted as aliases when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(alias = "price", default)]
    pub unit_price: Money,
    #[serde(alias = "name", default)]
    pub display_name: String,
    #[serde(alias = "image", default)]
    pub image_ref: String,
}

const fn default_quantity() -> u32 {
    1
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(normalize_size(raw.as_deref()))
}

/// Blank sizes mean "no size dimension".
fn normalize_size(size: Option<&str>) -> Option<String> {
    size.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl CartLine {
    /// The identity of this line within a cart.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.size.as_deref())
    }

    /// Whether this line has the given identity.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, size: Option<&str>) -> bool {
        self.product_id == *product_id && self.size.as_deref() == normalize_size(size).as_deref()
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// The `(product_id, size)` pair identifying a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: Option<String>,
}

impl LineKey {
    /// Build a key, normalizing blank sizes to `None`.
    #[must_use]
    pub fn new(product_id: ProductId, size: Option<&str>) -> Self {
        Self {
            product_id,
            size: normalize_size(size),
        }
    }
}

/// Product images as stored on catalog documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImages {
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
}

/// The catalog fields the cart needs when a product is added.
///
/// Catalog documents are inconsistent about where the primary image lives,
/// so every known location is carried and [`ProductSnapshot::resolve_image`]
/// picks one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Option<ProductImages>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub front_image_url: Option<String>,
    #[serde(default)]
    pub front_image: Option<String>,
}

impl ProductSnapshot {
    /// Minimal snapshot with no image fields.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image: None,
            images: None,
            image_url: None,
            front_image_url: None,
            front_image: None,
        }
    }

    /// First non-blank image among the candidate fields, in order:
    /// `image`, `images.front`, `imageUrl`, `frontImageUrl`, `frontImage`.
    /// Falls back to `placeholder`.
    #[must_use]
    pub fn resolve_image(&self, placeholder: &str) -> String {
        let front = self.images.as_ref().and_then(|images| images.front.as_deref());
        [
            self.image.as_deref(),
            front,
            self.image_url.as_deref(),
            self.front_image_url.as_deref(),
            self.front_image.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(placeholder)
        .to_owned()
    }

    /// Build a cart line from this snapshot, freezing price, name and image.
    #[must_use]
    pub fn to_line(&self, size: Option<&str>, quantity: u32, placeholder: &str) -> CartLine {
        CartLine {
            product_id: self.id.clone(),
            size: normalize_size(size),
            quantity: quantity.max(1),
            unit_price: self.price,
            display_name: self.name.clone(),
            image_ref: self.resolve_image(placeholder),
        }
    }
}

/// Normalize a quantity requested by the UI: floor, then clamp to ≥ 1.
///
/// Non-finite input yields 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked before the cast
pub fn normalize_requested(requested: f64) -> u32 {
    if !requested.is_finite() || requested < 1.0 {
        return 1;
    }
    let floored = requested.floor();
    if floored >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    floored as u32
}

/// An ordered sequence of cart lines; insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from externally supplied lines.
    ///
    /// Duplicate keys are folded into the first occurrence (quantities
    /// summed) and zero quantities are clamped to 1.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for mut line in lines {
            line.quantity = line.quantity.max(1);
            cart.push_or_accumulate(line);
        }
        cart
    }

    /// The lines, in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Copy of the lines.
    #[must_use]
    pub fn to_vec(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Find the line with the given identity.
    #[must_use]
    pub fn find(&self, product_id: &ProductId, size: Option<&str>) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(product_id, size))
    }

    /// Add a line, accumulating quantity onto an existing line with the same
    /// key. The existing line keeps its frozen price, name and image.
    pub fn add(&mut self, mut line: CartLine) {
        line.quantity = line.quantity.max(1);
        self.push_or_accumulate(line);
    }

    /// Remove the line with the given identity.
    ///
    /// Returns `false` (and leaves the cart untouched) when no line matches.
    pub fn remove(&mut self, product_id: &ProductId, size: Option<&str>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| !line.matches(product_id, size));
        self.lines.len() != before
    }

    /// Replace the quantity of the line with the given identity.
    ///
    /// Returns `false` without mutating when `quantity < 1`, when no line
    /// matches, or when the quantity is unchanged.
    pub fn set_quantity(&mut self, product_id: &ProductId, size: Option<&str>, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return false;
        };
        if quantity < 1 {
            return false;
        }
        match self.lines.iter_mut().find(|line| line.matches(product_id, size)) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Fold every line of `other` into this cart.
    ///
    /// Returns `true` if anything changed.
    pub fn absorb(&mut self, other: Self) -> bool {
        let changed = !other.is_empty();
        for line in other.lines {
            self.push_or_accumulate(line);
        }
        changed
    }

    /// Take the quantities in `other` out of this cart, dropping lines that
    /// reach zero. Lines of `other` with no match are ignored.
    ///
    /// Returns `true` if anything changed.
    pub fn subtract(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for taken in &other.lines {
            if let Some(line) = self
                .lines
                .iter_mut()
                .find(|line| line.product_id == taken.product_id && line.size == taken.size)
            {
                line.quantity = line.quantity.saturating_sub(taken.quantity);
                changed = true;
            }
        }
        self.lines.retain(|line| line.quantity > 0);
        changed
    }

    /// Remove every line. Returns `true` if the cart was non-empty.
    pub fn clear(&mut self) -> bool {
        let changed = !self.lines.is_empty();
        self.lines.clear();
        changed
    }

    fn push_or_accumulate(&mut self, line: CartLine) {
        match self
            .lines
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id && existing.size == line.size)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => self.lines.push(line),
        }
    }
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let lines = Vec::<CartLine>::deserialize(deserializer)?;
        Ok(Self::from_lines(lines))
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}
