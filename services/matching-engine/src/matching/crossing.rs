//! Crossing detection logic
//!
//! Determines when a back and a lay order can match based on price

use types::numeric::Price;
use types::order::Side;

/// A back order at `back_price` matches a lay order at `lay_price` when the
/// backer is willing to pay at least what the layer asks
pub fn can_match(back_price: Price, lay_price: Price) -> bool {
    back_price >= lay_price
}

/// Check if an incoming limit crosses a resting order's price
pub fn incoming_can_match(incoming_side: Side, incoming_price: Price, resting_price: Price) -> bool {
    match incoming_side {
        Side::Back => can_match(incoming_price, resting_price),
        Side::Lay => can_match(resting_price, incoming_price),
    }
}
