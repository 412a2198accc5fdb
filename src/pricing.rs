//! Money math for the shop. All amounts are integer cents and percentage
//! discounts floor toward zero, so totals are exact and never fractional.

/// Unit price after the product's own discount. Never negative: the schema
/// constrains `discount_percent` to 0..=100, and the subtraction is clamped
/// anyway so a bad row cannot produce a negative price.
pub fn discounted_unit_price(price_cents: i64, discount_percent: i32) -> i64 {
    let discount = price_cents * i64::from(discount_percent) / 100;
    (price_cents - discount).max(0)
}

/// Promotion discount on an order subtotal.
pub fn promo_discount(subtotal_cents: i64, discount_percent: i32) -> i64 {
    subtotal_cents * i64::from(discount_percent) / 100
}

/// Flat fee below the free-shipping bar; free at or above it.
/// `free_min_cents == 0` disables free shipping entirely.
pub fn shipping_fee(subtotal_cents: i64, fee_cents: i64, free_min_cents: i64) -> i64 {
    if free_min_cents > 0 && subtotal_cents >= free_min_cents {
        0
    } else {
        fee_cents
    }
}

pub fn order_total(subtotal_cents: i64, discount_cents: i64, shipping_cents: i64) -> i64 {
    subtotal_cents - discount_cents + shipping_cents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discounted_price_follows_percentage() {
        assert_eq!(discounted_unit_price(1000, 0), 1000);
        assert_eq!(discounted_unit_price(1000, 10), 900);
        assert_eq!(discounted_unit_price(1000, 100), 0);
        // floors, does not round
        assert_eq!(discounted_unit_price(999, 10), 900);
    }

    #[test]
    fn discounted_price_never_negative() {
        assert_eq!(discounted_unit_price(0, 100), 0);
        assert_eq!(discounted_unit_price(1, 100), 0);
    }

    #[test]
    fn two_tenners_at_ten_percent_plus_a_fiver_is_23_dollars() {
        // 2 x $10.00 at 10% product discount + 1 x $5.00, free shipping
        let line_a = discounted_unit_price(1000, 10) * 2;
        let line_b = discounted_unit_price(500, 0);
        let subtotal = line_a + line_b;
        assert_eq!(subtotal, 2300);
        assert_eq!(order_total(subtotal, 0, 0), 2300);
    }

    #[test]
    fn promo_discount_applies_to_subtotal() {
        assert_eq!(promo_discount(2000, 10), 200);
        assert_eq!(promo_discount(2000, 0), 0);
        assert_eq!(promo_discount(99, 10), 9);
    }

    #[test]
    fn shipping_free_above_threshold() {
        assert_eq!(shipping_fee(4999, 500, 5000), 500);
        assert_eq!(shipping_fee(5000, 500, 5000), 0);
        // rule disabled
        assert_eq!(shipping_fee(1_000_000, 500, 0), 500);
    }

    #[test]
    fn total_combines_discount_and_shipping() {
        assert_eq!(order_total(2300, 230, 500), 2570);
    }
}
