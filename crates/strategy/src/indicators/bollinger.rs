use super::moving_average::sma_series;

/// Bollinger Bands: SMA(period) ± k × population standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev: f64) -> Self {
        Self { period, std_dev }
    }

    pub fn series(&self, closes: &[f64]) -> Option<BandSeries> {
        let middle = sma_series(closes, self.period)?;
        let n = self.period as f64;

        let mut upper = Vec::with_capacity(middle.len());
        let mut lower = Vec::with_capacity(middle.len());
        for (window, mean) in closes.windows(self.period).zip(&middle) {
            let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
            let band = self.std_dev * variance.sqrt();
            upper.push(mean + band);
            lower.push(mean - band);
        }

        Some(BandSeries {
            upper,
            middle,
            lower,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_prices_collapse_bands() {
        let bb = BollingerBands::new(5, 2.0);
        let bands = bb.series(&[10.0; 8]).unwrap();
        assert_eq!(bands.middle.len(), 4);
        assert_eq!(bands.upper, bands.middle);
        assert_eq!(bands.lower, bands.middle);
    }

    #[test]
    fn bands_are_symmetric_around_middle() {
        let bb = BollingerBands::new(4, 2.0);
        let bands = bb.series(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        // mean 2.5, population variance 1.25
        let band = 2.0 * 1.25_f64.sqrt();
        assert!((bands.upper[0] - (2.5 + band)).abs() < 1e-12);
        assert!((bands.lower[0] - (2.5 - band)).abs() < 1e-12);
    }

    #[test]
    fn needs_full_window() {
        assert!(BollingerBands::new(20, 2.0).series(&[1.0; 19]).is_none());
    }
}
