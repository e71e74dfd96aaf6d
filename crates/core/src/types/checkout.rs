//! Checkout form validation and order totals.

use serde::{Deserialize, Serialize};

use rust_decimal::Decimal;

use super::cart::Cart;
use super::email::Email;
use super::price::Money;

/// Flat shipping fee charged on any non-empty order.
pub const SHIPPING_FEE: i64 = 3_500;

/// VAT rate applied to the subtotal (7.5%).
#[must_use]
pub fn tax_rate() -> Decimal {
    Decimal::new(75, 3)
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card via the payment gateway.
    #[default]
    Card,
    /// Direct bank transfer.
    Transfer,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Cod => "cod",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(Self::Card),
            "transfer" => Some(Self::Transfer),
            "cod" => Some(Self::Cod),
            _ => None,
        }
    }
}

/// Shipping and contact details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub notes: String,
    pub payment_method: PaymentMethod,
}

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProblem {
    Required,
    InvalidEmail,
}

/// A single failing form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub problem: FieldProblem,
}

impl FieldError {
    const fn new(field: &'static str, problem: FieldProblem) -> Self {
        Self { field, problem }
    }
}

impl CheckoutForm {
    /// Validate every field, returning all failures at once.
    ///
    /// On success returns the parsed email. Field names in errors use the
    /// form's camelCase names so the UI can attach messages directly.
    ///
    /// # Errors
    ///
    /// Returns the list of failing fields.
    pub fn validate(&self) -> Result<Email, Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.full_name.trim().is_empty() {
            errors.push(FieldError::new("fullName", FieldProblem::Required));
        }

        let email = Email::parse(&self.email);
        if email.is_err() {
            errors.push(FieldError::new("email", FieldProblem::InvalidEmail));
        }

        let required = [
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, FieldProblem::Required));
            }
        }

        match email {
            Ok(email) if errors.is_empty() => Ok(email),
            _ => Err(errors),
        }
    }
}

/// Amounts shown on the order summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CheckoutTotals {
    /// Compute totals for a cart.
    ///
    /// Shipping is only charged when there is something to ship; tax is
    /// rounded to whole naira.
    #[must_use]
    pub fn for_cart(cart: &Cart) -> Self {
        let subtotal = cart.subtotal();
        let shipping = if subtotal.is_zero() {
            Money::ZERO
        } else {
            Money::from_units(SHIPPING_FEE)
        };
        let tax = subtotal.scale(tax_rate()).round_units();

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::cart::ProductSnapshot;

    fn filled_form() -> CheckoutForm {
        CheckoutForm {
            full_name: "Ada Obi".to_owned(),
            email: "ada@zenro.ng".to_owned(),
            phone: "+2348000000000".to_owned(),
            address: "12 Admiralty Way".to_owned(),
            city: "Lekki".to_owned(),
            state: "Lagos".to_owned(),
            postal_code: "105102".to_owned(),
            notes: String::new(),
            payment_method: PaymentMethod::Card,
        }
    }

    #[test]
    fn test_valid_form() {
        let email = filled_form().validate().unwrap();
        assert_eq!(email.as_str(), "ada@zenro.ng");
    }

    #[test]
    fn test_reports_every_failing_field() {
        let form = CheckoutForm {
            email: "nope".to_owned(),
            ..CheckoutForm::default()
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();

        assert_eq!(
            fields,
            ["fullName", "email", "phone", "address", "city", "state", "postalCode"]
        );
        assert_eq!(errors[1].problem, FieldProblem::InvalidEmail);
    }

    #[test]
    fn test_whitespace_only_is_missing() {
        let form = CheckoutForm {
            city: "   ".to_owned(),
            ..filled_form()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors, vec![FieldError::new("city", FieldProblem::Required)]);
    }

    #[test]
    fn test_totals_for_empty_cart() {
        let totals = CheckoutTotals::for_cart(&Cart::new());
        assert_eq!(totals.total, Money::ZERO);
        assert_eq!(totals.shipping, Money::ZERO);
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        let tee = ProductSnapshot::new("1", "Tee", Money::from_units(39_500));
        cart.add(tee.to_line(Some("M"), 2, "/p.webp"));

        let totals = CheckoutTotals::for_cart(&cart);
        assert_eq!(totals.subtotal, Money::from_units(79_000));
        assert_eq!(totals.shipping, Money::from_units(3_500));
        assert_eq!(totals.tax, Money::from_units(5_925));
        assert_eq!(totals.total, Money::from_units(88_425));
    }

    #[test]
    fn test_payment_method_round_trips_through_str() {
        for method in [PaymentMethod::Card, PaymentMethod::Transfer, PaymentMethod::Cod] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::parse("crypto"), None);
    }
}
