use rand::Rng;

pub const FALLBACK_DECIMALS: u32 = 18;

/// Token amount range in whole tokens plus the token's decimal scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
    pub decimals: u32,
}

impl AmountRange {
    /// An inverted range collapses to `min`; zero decimals fall back to 18.
    pub fn new(min: f64, max: f64, decimals: u32) -> Self {
        Self {
            min,
            max: if max <= min { min } else { max },
            decimals: if decimals == 0 {
                FALLBACK_DECIMALS
            } else {
                decimals
            },
        }
    }

    pub fn fixed(amount: f64, decimals: u32) -> Self {
        Self::new(amount, amount, decimals)
    }

    pub fn sample(&self) -> u128 {
        sample_with(&mut rand::thread_rng(), self.min, self.max, self.decimals as i32)
    }

    /// Smallest-unit bounds every sample falls within.
    pub fn bounds(&self) -> (u128, u128) {
        let scale = scale_for(self.decimals as i32);
        (to_units(self.min * scale), to_units(self.max * scale))
    }
}

/// Draws a uniform amount in `[min, max)` whole tokens and converts it to the
/// smallest unit at `decimals` (18 when `decimals <= 0`).
pub fn sample_amount(min: f64, max: f64, decimals: i32) -> u128 {
    sample_with(&mut rand::thread_rng(), min, max, decimals)
}

pub fn sample_with<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64, decimals: i32) -> u128 {
    let max = if max <= min { min } else { max };
    let value = (min + rng.gen::<f64>() * (max - min)).min(max);
    to_units(value * scale_for(decimals))
}

fn scale_for(decimals: i32) -> f64 {
    let decimals = if decimals <= 0 {
        FALLBACK_DECIMALS as i32
    } else {
        decimals
    };
    10f64.powi(decimals)
}

fn to_units(scaled: f64) -> u128 {
    // `as` saturates: negatives and NaN become 0, overflow becomes u128::MAX.
    scaled.round() as u128
}

/// Renders a smallest-unit amount as a decimal token string, e.g. `3.25`.
pub fn format_units(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = decimals as usize + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
