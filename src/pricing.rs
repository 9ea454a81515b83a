use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::model::{Booking, Ms};

#[derive(Debug)]
pub struct PricingError(pub String);

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pricing failed: {}", self.0)
    }
}

impl std::error::Error for PricingError {}

/// External pricing collaborator. The engine treats failures as a degraded
/// path: the booking stays persisted and unpriced.
#[async_trait]
pub trait PricingGateway: Send + Sync {
    async fn calculate_price(&self, booking: &Booking) -> Result<Decimal, PricingError>;
}

const BASE_RATE_PER_HOUR: Decimal = dec!(35.00);
const PEAK_HOUR_MULTIPLIER: Decimal = dec!(1.25);
const WEEKEND_MULTIPLIER: Decimal = dec!(1.20);
const MS_PER_HOUR: Decimal = dec!(3600000);

const DAY_MS: Ms = 86_400_000;
const HOUR_MS: Ms = 3_600_000;

/// Reference pricing: base hourly rate with peak-hour and weekend
/// multipliers, rounded half-up to cents.
pub struct HourlyRatePricing;

/// Day-of-week index with 0 = Thursday (the epoch day). Saturday = 2, Sunday = 3.
fn weekday_index(t: Ms) -> i64 {
    t.div_euclid(DAY_MS).rem_euclid(7)
}

fn is_weekend(t: Ms) -> bool {
    let d = weekday_index(t);
    d == 2 || d == 3
}

/// Peak demand window: walks starting 17:00–20:00 UTC.
fn is_peak_hour(t: Ms) -> bool {
    let hour = t.rem_euclid(DAY_MS) / HOUR_MS;
    (17..20).contains(&hour)
}

#[async_trait]
impl PricingGateway for HourlyRatePricing {
    async fn calculate_price(&self, booking: &Booking) -> Result<Decimal, PricingError> {
        let duration_hours = Decimal::from(booking.span.duration_ms()) / MS_PER_HOUR;
        let mut price = BASE_RATE_PER_HOUR * duration_hours;
        if is_peak_hour(booking.span.start) {
            price *= PEAK_HOUR_MULTIPLIER;
        }
        if is_weekend(booking.span.start) {
            price *= WEEKEND_MULTIPLIER;
        }
        Ok(price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}
