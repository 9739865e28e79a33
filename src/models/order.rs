//! Order model

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::{from_minor, SCALE};
use super::{Address, UserSummary};

/// Tax charged on the subtotal, in percent
pub const TAX_RATE_PERCENT: i64 = 18;

/// Flat delivery fee per order, in minor units
pub const DELIVERY_FEE_MINOR: i64 = 5000;

/// Fulfilment status of an order.
///
/// The usual path is PENDING, CONFIRMED, SHIPPED, DELIVERED. CANCELLED may
/// be set at any point before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid order status: {}", s)),
        }
    }
}

/// A placed order with its buyer, delivery address and line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub address_id: i64,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserSummary,
    pub address: Address,
    pub order_items: Vec<OrderItem>,
}

/// One line of an order. `unit_price` is the price at the time of purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub product: OrderItemProduct,
}

/// Current product details shown next to an order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemProduct {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub unit: String,
}

/// Requested product and quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub items: Vec<OrderLine>,
    pub address_id: i64,
}

/// An order line with its price fixed at placement time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Monetary summary of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Tax and the delivery fee applied to a subtotal.
    ///
    /// Returns `None` when an amount leaves the `Decimal` range.
    pub fn from_subtotal(subtotal: Decimal) -> Option<Self> {
        let tax = subtotal
            .checked_mul(Decimal::new(TAX_RATE_PERCENT, 2))?
            .round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        let delivery_fee = from_minor(DELIVERY_FEE_MINOR);
        let total = subtotal.checked_add(tax)?.checked_add(delivery_fee)?;
        Some(Self {
            subtotal,
            tax,
            delivery_fee,
            total,
        })
    }
}

/// Why a set of order lines could not be priced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    /// No price for this product, i.e. it is missing or inactive
    Unavailable(i64),
    /// A line total or the order total is too large to represent
    Overflow,
}

/// Price every requested line using `unit_price` lookups
pub fn price_order(
    lines: &[OrderLine],
    unit_price: impl Fn(i64) -> Option<Decimal>,
) -> Result<(Vec<PricedLine>, OrderTotals), PricingError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        let unit_price =
            unit_price(line.product_id).ok_or(PricingError::Unavailable(line.product_id))?;
        let line_total = unit_price
            .checked_mul(Decimal::from(line.quantity))
            .ok_or(PricingError::Overflow)?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or(PricingError::Overflow)?;
        priced.push(PricedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price,
            line_total,
        });
    }

    let totals = OrderTotals::from_subtotal(subtotal).ok_or(PricingError::Overflow)?;
    Ok((priced, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_price_order_example_cart() {
        let prices = HashMap::from([(1, Decimal::new(100, 0)), (2, Decimal::new(200, 0))]);
        let lines = [
            OrderLine { product_id: 1, quantity: 2 },
            OrderLine { product_id: 2, quantity: 1 },
        ];

        let (priced, totals) = price_order(&lines, |id| prices.get(&id).copied()).unwrap();

        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].line_total, Decimal::new(200, 0));
        assert_eq!(totals.subtotal, Decimal::new(400, 0));
        assert_eq!(totals.tax, Decimal::new(72, 0));
        assert_eq!(totals.delivery_fee, Decimal::new(50, 0));
        assert_eq!(totals.total, Decimal::new(522, 0));
    }

    #[test]
    fn test_price_order_missing_product() {
        let lines = [OrderLine { product_id: 9, quantity: 1 }];
        assert_eq!(
            price_order(&lines, |_| None).unwrap_err(),
            PricingError::Unavailable(9)
        );
    }

    #[test]
    fn test_price_order_overflow_is_an_error() {
        let lines = [OrderLine { product_id: 1, quantity: i64::MAX }];
        let huge = Decimal::new(10_000_000_000, 0);
        assert_eq!(
            price_order(&lines, |_| Some(huge)).unwrap_err(),
            PricingError::Overflow
        );

        let lines = [
            OrderLine { product_id: 1, quantity: i64::MAX },
            OrderLine { product_id: 2, quantity: i64::MAX },
        ];
        assert_eq!(
            price_order(&lines, |_| Some(Decimal::new(5_000_000_000, 0))).unwrap_err(),
            PricingError::Overflow
        );
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.25 * 0.18 = 0.045
        let totals = OrderTotals::from_subtotal(Decimal::new(25, 2)).unwrap();
        assert_eq!(totals.tax, Decimal::new(5, 2));
    }

    proptest! {
        #[test]
        fn totals_add_up(
            lines in prop::collection::vec((1i64..1_000_000, 1i64..500), 1..8)
        ) {
            let order_lines: Vec<OrderLine> = lines
                .iter()
                .enumerate()
                .map(|(idx, (_, qty))| OrderLine { product_id: idx as i64, quantity: *qty })
                .collect();
            let (priced, totals) = price_order(&order_lines, |id| {
                lines.get(id as usize).map(|(minor, _)| from_minor(*minor))
            })
            .unwrap();

            let line_sum: Decimal = priced.iter().map(|l| l.line_total).sum();
            prop_assert_eq!(totals.subtotal, line_sum);
            prop_assert_eq!(totals.total, totals.subtotal + totals.tax + totals.delivery_fee);
            prop_assert_eq!(
                totals.tax,
                (totals.subtotal * Decimal::new(18, 2))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            );
            prop_assert_eq!(totals.delivery_fee, Decimal::new(50, 0));
            prop_assert_eq!(priced.len(), order_lines.len());
        }
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("RETURNED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(OrderStatus::Shipped).unwrap(),
            serde_json::json!("SHIPPED")
        );
    }
}
