use rust_decimal::Decimal;

use crate::models::{Cart, Profile};

/// Computes the shipping charge recorded on a new order.
pub trait ShippingPolicy: Send + Sync {
    fn shipping_amount(&self, profile: &Profile, cart: &Cart) -> Decimal;
}

/// Same charge for every order. The default amount is zero.
#[derive(Debug, Clone, Default)]
pub struct FlatRateShipping {
    pub amount: Decimal,
}

impl FlatRateShipping {
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }
}

impl ShippingPolicy for FlatRateShipping {
    fn shipping_amount(&self, _profile: &Profile, cart: &Cart) -> Decimal {
        if cart.is_empty() {
            return Decimal::ZERO;
        }
        self.amount
    }
}
