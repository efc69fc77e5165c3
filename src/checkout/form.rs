//! Checkout form input and payment selection.

use serde::Deserialize;
use std::fmt;
use validator::Validate;

use crate::domain::aggregates::order::CUSTOMER_FIELDS;
use crate::domain::validation::{first_failure, not_blank, ValidationError};
use crate::domain::PaymentMethod;

const CARD_FIELDS: [&str; 4] = ["card_number", "card_expiry", "card_cvv", "card_holder_id"];

/// What the customer typed on the checkout page. Everything arrives as text.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct CheckoutForm {
    #[validate(custom = "not_blank")]
    pub customer_name: String,
    #[validate(custom = "not_blank", email)]
    pub customer_email: String,
    #[validate(custom = "not_blank")]
    pub customer_phone: String,
    #[validate(custom = "not_blank")]
    pub shipping_address: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_expiry: String,
    #[serde(default)]
    pub card_cvv: String,
    #[serde(default)]
    pub card_holder_id: String,
}

fn default_payment_method() -> String { PaymentMethod::Cash.as_str().to_string() }

impl CheckoutForm {
    /// Check the form in display order and resolve the payment selection.
    ///
    /// The first failing field is reported: customer fields, then the payment
    /// method, then card fields when paying by card. Card numbers are only
    /// checked for presence.
    pub fn validate_input(&self) -> Result<PaymentSelection, ValidationError> {
        if let Err(errors) = self.validate() {
            return Err(first_failure(&errors, &CUSTOMER_FIELDS));
        }
        let method: PaymentMethod = self.payment_method.parse()?;
        Ok(match method {
            PaymentMethod::Cash => PaymentSelection::Cash,
            PaymentMethod::BankTransfer => PaymentSelection::BankTransfer,
            PaymentMethod::Bit => PaymentSelection::Bit,
            PaymentMethod::CreditCard => {
                let card = CardDetails {
                    card_number: self.card_number.clone(),
                    card_expiry: self.card_expiry.clone(),
                    card_cvv: self.card_cvv.clone(),
                    card_holder_id: self.card_holder_id.clone(),
                };
                card.validate().map_err(|errors| first_failure(&errors, &CARD_FIELDS))?;
                PaymentSelection::CreditCard(card)
            }
        })
    }
}

/// Card fields collected at checkout. They stay on the client; only the
/// payment label reaches the order.
#[derive(Clone, PartialEq, Eq, Validate)]
pub struct CardDetails {
    #[validate(custom = "not_blank")]
    pub card_number: String,
    #[validate(custom = "not_blank")]
    pub card_expiry: String,
    #[validate(custom = "not_blank")]
    pub card_cvv: String,
    #[validate(custom = "not_blank")]
    pub card_holder_id: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &"[REDACTED]")
            .field("card_expiry", &"[REDACTED]")
            .field("card_cvv", &"[REDACTED]")
            .field("card_holder_id", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentSelection {
    Cash,
    BankTransfer,
    Bit,
    CreditCard(CardDetails),
}

impl PaymentSelection {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Cash => PaymentMethod::Cash,
            Self::BankTransfer => PaymentMethod::BankTransfer,
            Self::Bit => PaymentMethod::Bit,
            Self::CreditCard(_) => PaymentMethod::CreditCard,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn filled() -> CheckoutForm {
        CheckoutForm {
            customer_name: "Noa Levi".into(),
            customer_email: "noa@example.com".into(),
            customer_phone: "050-1234567".into(),
            shipping_address: "12 Herzl St".into(),
            city: "Haifa".into(),
            payment_method: "cash".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_cash_form() {
        assert_eq!(filled().validate_input(), Ok(PaymentSelection::Cash));
    }

    #[test]
    fn test_first_missing_field_in_display_order() {
        let mut form = filled();
        form.city = " ".into();
        form.customer_phone = String::new();
        assert_eq!(form.validate_input().unwrap_err(), ValidationError::missing("customer_phone"));
    }

    #[test]
    fn test_email_shape() {
        let mut form = filled();
        form.customer_email = "noa.example.com".into();
        assert_eq!(form.validate_input().unwrap_err().field, "customer_email");
    }

    #[test]
    fn test_unknown_payment_method() {
        let mut form = filled();
        form.payment_method = "paypal".into();
        assert_eq!(form.validate_input().unwrap_err().field, "payment_method");
    }

    #[test]
    fn test_credit_card_requires_every_card_field() {
        let mut form = filled();
        form.payment_method = "credit_card".into();
        form.card_number = "4580 1234 5678 9012".into();
        form.card_expiry = "12/27".into();
        assert_eq!(form.validate_input().unwrap_err(), ValidationError::missing("card_cvv"));

        form.card_cvv = "123".into();
        form.card_holder_id = "012345678".into();
        let selection = form.validate_input().unwrap();
        assert_eq!(selection.method(), PaymentMethod::CreditCard);
        assert!(!format!("{selection:?}").contains("4580"));
    }

    #[test]
    fn test_card_fields_ignored_for_other_methods() {
        let mut form = filled();
        form.payment_method = "bit".into();
        assert_eq!(form.validate_input(), Ok(PaymentSelection::Bit));
    }
}
