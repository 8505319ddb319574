use super::sizing::OrderIntent;
use crate::error::BotError;
use crate::models::{
    GapKind, InstrumentFilters, OrderRequest, OrderType, Side, SizeUnit, TimeInForce,
};
use crate::Result;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Order parameters aligned to the instrument's precision and inside its bounds
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub kind: GapKind,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

impl ValidatedOrder {
    /// `None` when the product overflows
    pub fn notional(&self) -> Option<Decimal> {
        self.qty.checked_mul(self.price)
    }

    /// Limit entry with market-executed stop and target legs
    pub fn to_request(&self, symbol: &str) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_string(),
            side: self.side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            size_unit: match self.kind {
                GapKind::Bullish => SizeUnit::QuoteCoin,
                GapKind::Bearish => SizeUnit::BaseCoin,
            },
            qty: self.qty,
            price: Some(self.price),
            take_profit: Some(self.take_profit),
            stop_loss: Some(self.stop_loss),
            sl_order_type: Some(OrderType::Market),
            tp_order_type: Some(OrderType::Market),
            order_link_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Round `value` down to a multiple of `step`. A non-positive step leaves it as is.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Result<Decimal> {
    if step <= Decimal::ZERO {
        return Ok(value);
    }
    value
        .checked_div(step)
        .and_then(|steps| steps.floor().checked_mul(step))
        .ok_or_else(|| {
            BotError::ValidationFailed(format!("{} does not fit step {}", value, step))
        })
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| BotError::ValidationFailed(format!("{} is not representable: {}", field, value)))
}

/// Clamps an order to exchange precision and rejects it when out of bounds
pub struct OrderFilterValidator<'a> {
    filters: &'a InstrumentFilters,
}

impl<'a> OrderFilterValidator<'a> {
    pub fn new(filters: &'a InstrumentFilters) -> Self {
        Self { filters }
    }

    pub fn validate(&self, intent: &OrderIntent) -> Result<ValidatedOrder> {
        let f = self.filters;

        // Bearish orders are sized in base units, bullish ones in quote units
        let size_step = match intent.kind {
            GapKind::Bearish => f.base_precision,
            GapKind::Bullish => f.quote_precision,
        };

        let order = ValidatedOrder {
            kind: intent.kind,
            side: intent.side,
            qty: floor_to_step(to_decimal(intent.raw_size, "size")?, size_step)?.normalize(),
            price: floor_to_step(to_decimal(intent.entry_price, "price")?, f.tick_size)?
                .normalize(),
            take_profit: floor_to_step(to_decimal(intent.take_profit, "takeProfit")?, f.tick_size)?
                .normalize(),
            stop_loss: floor_to_step(to_decimal(intent.stop_loss, "stopLoss")?, f.tick_size)?
                .normalize(),
        };

        tracing::info!(
            qty = %order.qty,
            price = %order.price,
            tp = %order.take_profit,
            sl = %order.stop_loss,
            "Order params after rounding"
        );

        if order.qty < f.min_qty || order.qty > f.max_qty {
            return Err(BotError::ValidationFailed(format!(
                "qty {} outside [{}, {}]",
                order.qty, f.min_qty, f.max_qty
            )));
        }

        let notional = order.notional().ok_or_else(|| {
            BotError::ValidationFailed(format!("notional of {} x {} overflows", order.qty, order.price))
        })?;
        if notional < f.min_notional || notional > f.max_notional {
            return Err(BotError::ValidationFailed(format!(
                "notional {} outside [{}, {}]",
                notional, f.min_notional, f.max_notional
            )));
        }

        Ok(order)
    }
}
