//! Terminal commands and their keyboard grammar
//!
//! ```text
//! b <qty>                    market buy
//! s <qty>                    market sell
//! l <qty>@<price>            limit buy
//! k <qty>@<price>            limit sell
//! tb <qty> <low> <high> <n>  tiered buy, total quantity
//! ts <qty> <low> <high> <n>  tiered sell, total quantity
//! tbv <value> <low> <high> <n>  tiered buy, total quote value
//! tsv <value> <low> <high> <n>  tiered sell, total quote value
//! x <order-id>               cancel one order
//! c                          cancel all orders for the symbol
//! cr <low> <high>            cancel orders priced in [low, high]
//! r                          refresh
//! ```
//!
//! Parsing only checks shape. Whether a number makes a valid order is
//! decided by the order manager.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiller_core::{OrderId, Price, Quantity, Side, TierSizing};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Market {
        side: Side,
        quantity: Quantity,
    },
    Limit {
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Tiered {
        side: Side,
        sizing: TierSizing,
        price_low: Price,
        price_high: Price,
        tier_count: u32,
    },
    Cancel(OrderId),
    CancelAll,
    CancelRange {
        price_low: Price,
        price_high: Price,
    },
    Refresh,
}

impl Command {
    /// Whether the command may send an order to the exchange
    pub fn places_orders(&self) -> bool {
        matches!(
            self,
            Command::Market { .. } | Command::Limit { .. } | Command::Tiered { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a number")]
    InvalidNumber(String),
    #[error("'{0}' is not an order id")]
    InvalidOrderId(String),
}

fn number(raw: &str) -> Result<Decimal, ParseCommandError> {
    Decimal::from_str(raw).map_err(|_| ParseCommandError::InvalidNumber(raw.to_string()))
}

fn count(raw: &str) -> Result<u32, ParseCommandError> {
    raw.parse::<u32>()
        .map_err(|_| ParseCommandError::InvalidNumber(raw.to_string()))
}

/// `<qty>@<price>`, spaces around `@` allowed
fn quantity_at_price(args: &[&str], usage: &'static str) -> Result<(Quantity, Price), ParseCommandError> {
    let joined = args.concat();
    let (quantity, price) = joined
        .split_once('@')
        .ok_or(ParseCommandError::Usage(usage))?;
    if quantity.is_empty() || price.is_empty() {
        return Err(ParseCommandError::Usage(usage));
    }
    Ok((number(quantity)?, number(price)?))
}

fn tiered(
    args: &[&str],
    side: Side,
    by_value: bool,
    usage: &'static str,
) -> Result<Command, ParseCommandError> {
    let [amount, low, high, n] = args else {
        return Err(ParseCommandError::Usage(usage));
    };
    let amount = number(amount)?;
    let sizing = if by_value {
        TierSizing::Notional(amount)
    } else {
        TierSizing::Quantity(amount)
    };
    Ok(Command::Tiered {
        side,
        sizing,
        price_low: number(low)?,
        price_high: number(high)?,
        tier_count: count(n)?,
    })
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut words = input.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        match verb.as_str() {
            "b" | "s" => {
                let usage = if verb == "b" { "b <qty>" } else { "s <qty>" };
                let [quantity] = args.as_slice() else {
                    return Err(ParseCommandError::Usage(usage));
                };
                let side = if verb == "b" { Side::Buy } else { Side::Sell };
                Ok(Command::Market {
                    side,
                    quantity: number(quantity)?,
                })
            }
            "l" => {
                let (quantity, price) = quantity_at_price(&args, "l <qty>@<price>")?;
                Ok(Command::Limit {
                    side: Side::Buy,
                    quantity,
                    price,
                })
            }
            "k" => {
                let (quantity, price) = quantity_at_price(&args, "k <qty>@<price>")?;
                Ok(Command::Limit {
                    side: Side::Sell,
                    quantity,
                    price,
                })
            }
            "tb" => tiered(&args, Side::Buy, false, "tb <qty> <low> <high> <n>"),
            "ts" => tiered(&args, Side::Sell, false, "ts <qty> <low> <high> <n>"),
            "tbv" => tiered(&args, Side::Buy, true, "tbv <value> <low> <high> <n>"),
            "tsv" => tiered(&args, Side::Sell, true, "tsv <value> <low> <high> <n>"),
            "x" => {
                let [id] = args.as_slice() else {
                    return Err(ParseCommandError::Usage("x <order-id>"));
                };
                Uuid::parse_str(id)
                    .map(Command::Cancel)
                    .map_err(|_| ParseCommandError::InvalidOrderId(id.to_string()))
            }
            "c" if args.is_empty() => Ok(Command::CancelAll),
            "c" => Err(ParseCommandError::Usage("c")),
            "cr" => {
                let [low, high] = args.as_slice() else {
                    return Err(ParseCommandError::Usage("cr <low> <high>"));
                };
                Ok(Command::CancelRange {
                    price_low: number(low)?,
                    price_high: number(high)?,
                })
            }
            "r" if args.is_empty() => Ok(Command::Refresh),
            "r" => Err(ParseCommandError::Usage("r")),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}
