//! The five feature families.
//!
//! Each builder returns named series in a fixed column order; the assembler
//! concatenates the families and owns the missing-value repairs.

use std::f64::consts::TAU;

use chrono::{Datelike, NaiveDate};

use volregime_core::schema::{self, CHANGE_HORIZONS, FEATURE_WINDOWS, INTERACTION_WINDOW};
use volregime_core::stats;

pub(crate) type NamedSeries = (String, Vec<f64>);

fn trend_strength(values: &[f64], window: usize) -> Vec<f64> {
    let ma = stats::rolling_mean(values, window);
    values.iter().zip(&ma).map(|(v, m)| (v - m) / m).collect()
}

/// Price family (13): changes, volatility of one-step changes, momentum,
/// trend strength against the rolling mean.
pub fn price_features(close: &[f64]) -> Vec<NamedSeries> {
    let mut out = Vec::with_capacity(13);
    for horizon in CHANGE_HORIZONS {
        out.push((
            schema::windowed_name("price_change", horizon),
            stats::pct_change(close, horizon),
        ));
    }
    let one_step = stats::pct_change(close, 1);
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("price_volatility", window),
            stats::rolling_std(&one_step, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("price_momentum", window),
            stats::pct_change(close, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("trend_strength", window),
            trend_strength(close, window),
        ));
    }
    out
}

/// Volume family (19): the same four kinds as the price family, plus the raw
/// rolling mean and std per window.
pub fn volume_features(volume: &[f64]) -> Vec<NamedSeries> {
    let mut out = Vec::with_capacity(19);
    for horizon in CHANGE_HORIZONS {
        out.push((
            schema::windowed_name("volume_change", horizon),
            stats::pct_change(volume, horizon),
        ));
    }
    let one_step = stats::pct_change(volume, 1);
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volume_volatility", window),
            stats::rolling_std(&one_step, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volume_ma", window),
            stats::rolling_mean(volume, window),
        ));
        out.push((
            schema::windowed_name("volume_std", window),
            stats::rolling_std(volume, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volume_momentum", window),
            stats::pct_change(volume, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volume_trend_strength", window),
            trend_strength(volume, window),
        ));
    }
    out
}

/// Volatility family (16). Takes the already-built target series, so regime
/// persistence cannot be computed before the target exists.
pub fn volatility_features(volatility: &[f64], target: &[f64]) -> Vec<NamedSeries> {
    let mut out = Vec::with_capacity(16);
    for horizon in CHANGE_HORIZONS {
        out.push((
            schema::windowed_name("volatility_change", horizon),
            stats::pct_change(volatility, horizon),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volatility_ma", window),
            stats::rolling_mean(volatility, window),
        ));
        out.push((
            schema::windowed_name("volatility_std", window),
            stats::rolling_std(volatility, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("volatility_momentum", window),
            stats::pct_change(volatility, window),
        ));
    }
    for window in FEATURE_WINDOWS {
        out.push((
            schema::windowed_name("regime_persistence", window),
            stats::rolling_mean(target, window),
        ));
    }
    out
}

fn map_dates(timestamps: &[Option<NaiveDate>], f: impl Fn(NaiveDate) -> f64) -> Vec<f64> {
    timestamps
        .iter()
        .map(|ts| ts.map(&f).unwrap_or(f64::NAN))
        .collect()
}

/// Time family (10): calendar fields plus cyclical encodings. Rows with a
/// missing date get NaN everywhere.
pub fn time_features(timestamps: &[Option<NaiveDate>]) -> Vec<NamedSeries> {
    let day_of_week = map_dates(timestamps, |d| d.weekday().num_days_from_monday() as f64);
    let is_weekend: Vec<f64> = day_of_week
        .iter()
        .map(|&d| {
            if d.is_nan() {
                f64::NAN
            } else if d >= 5.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let month = map_dates(timestamps, |d| d.month() as f64);
    let is_month_end = map_dates(timestamps, |d| match d.succ_opt() {
        Some(next) if next.month() == d.month() => 0.0,
        _ => 1.0,
    });
    let is_month_start = map_dates(timestamps, |d| if d.day() == 1 { 1.0 } else { 0.0 });
    let quarter = map_dates(timestamps, |d| ((d.month() - 1) / 3 + 1) as f64);
    let day_of_week_sin: Vec<f64> = day_of_week.iter().map(|d| (TAU * d / 7.0).sin()).collect();
    let day_of_week_cos: Vec<f64> = day_of_week.iter().map(|d| (TAU * d / 7.0).cos()).collect();
    let month_sin: Vec<f64> = month.iter().map(|m| (TAU * m / 12.0).sin()).collect();
    let month_cos: Vec<f64> = month.iter().map(|m| (TAU * m / 12.0).cos()).collect();

    vec![
        ("day_of_week".into(), day_of_week),
        ("is_weekend".into(), is_weekend),
        ("month".into(), month),
        ("is_month_end".into(), is_month_end),
        ("is_month_start".into(), is_month_start),
        ("quarter".into(), quarter),
        ("day_of_week_sin".into(), day_of_week_sin),
        ("day_of_week_cos".into(), day_of_week_cos),
        ("month_sin".into(), month_sin),
        ("month_cos".into(), month_cos),
    ]
}

/// Interaction family (3): rolling correlations between price changes,
/// volume, and volatility. Price and volume enter as one-step changes where
/// the original metric is a level.
pub fn interaction_features(
    close: &[f64],
    volume: &[f64],
    volatility: &[f64],
) -> Vec<NamedSeries> {
    let price_change = stats::pct_change(close, 1);
    let volume_change = stats::pct_change(volume, 1);
    let window = INTERACTION_WINDOW;
    vec![
        (
            schema::windowed_name("price_volume_correlation", window),
            stats::rolling_corr(&price_change, &volume_change, window),
        ),
        (
            schema::windowed_name("volatility_volume_correlation", window),
            stats::rolling_corr(volatility, volume, window),
        ),
        (
            schema::windowed_name("price_volatility_correlation", window),
            stats::rolling_corr(&price_change, volatility, window),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(series: &[NamedSeries]) -> Vec<&str> {
        series.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn test_price_family_order() {
        let close: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let series = price_features(&close);
        assert_eq!(
            names(&series),
            vec![
                "price_change_1d",
                "price_change_3d",
                "price_change_5d",
                "price_change_10d",
                "price_volatility_5d",
                "price_volatility_10d",
                "price_volatility_20d",
                "price_momentum_5d",
                "price_momentum_10d",
                "price_momentum_20d",
                "trend_strength_5d",
                "trend_strength_10d",
                "trend_strength_20d",
            ]
        );
    }

    #[test]
    fn test_trend_strength_values() {
        let close = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let series = price_features(&close);
        let (_, trend5) = &series[10];
        assert!(trend5[3].is_nan());
        // window 5 mean at index 4 is 3.0 -> (5 - 3) / 3
        assert!((trend5[4] - 2.0 / 3.0).abs() < 1e-12);
        assert!((trend5[5] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_is_windowed_change() {
        let close = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0];
        let series = price_features(&close);
        let (_, momentum5) = &series[7];
        assert!(momentum5[4].is_nan());
        assert!((momentum5[5] - (110.0 / 100.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_volume_family_has_nineteen_columns() {
        let volume: Vec<f64> = (1..=30).map(|i| 1000.0 + i as f64).collect();
        let series = volume_features(&volume);
        assert_eq!(series.len(), 19);
        let names = names(&series);
        assert_eq!(names[0], "volume_change_1d");
        assert_eq!(names[4], "volume_volatility_5d");
        assert_eq!(names[7], "volume_ma_5d");
        assert_eq!(names[8], "volume_std_5d");
        assert_eq!(names[13], "volume_momentum_5d");
        assert_eq!(names[16], "volume_trend_strength_5d");
    }

    #[test]
    fn test_volatility_family_persistence_follows_target() {
        let volatility: Vec<f64> = (1..=10).map(|i| 0.01 * i as f64).collect();
        let target = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let series = volatility_features(&volatility, &target);
        assert_eq!(series.len(), 16);
        let (name, persistence5) = &series[13];
        assert_eq!(name, "regime_persistence_5d");
        assert!(persistence5[3].is_nan());
        assert!((persistence5[4] - 0.2).abs() < 1e-12);
        assert!((persistence5[8] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_features_calendar() {
        let dates = vec![
            Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()), // Wednesday
            Some(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            None,
            Some(NaiveDate::from_ymd_opt(2024, 4, 6).unwrap()), // Saturday
        ];
        let series = time_features(&dates);
        assert_eq!(series.len(), 10);
        let get = |name: &str| -> &Vec<f64> {
            &series.iter().find(|(n, _)| n == name).unwrap().1
        };

        assert_eq!(get("day_of_week")[0], 2.0);
        assert_eq!(get("is_weekend")[0], 0.0);
        assert_eq!(get("is_weekend")[3], 1.0);
        assert_eq!(get("is_month_end")[0], 1.0);
        assert_eq!(get("is_month_end")[1], 0.0);
        assert_eq!(get("is_month_start")[1], 1.0);
        assert_eq!(get("quarter")[0], 1.0);
        assert_eq!(get("quarter")[3], 2.0);
        assert!(get("day_of_week")[2].is_nan());
        assert!(get("is_weekend")[2].is_nan());
        assert!(get("month_sin")[2].is_nan());

        // Monday would encode to (sin 0, cos 1); Wednesday is 2/7 of the circle
        let angle = TAU * 2.0 / 7.0;
        assert!((get("day_of_week_sin")[0] - angle.sin()).abs() < 1e-12);
        assert!((get("day_of_week_cos")[0] - angle.cos()).abs() < 1e-12);
    }

    #[test]
    fn test_interaction_correlations() {
        // volume moves in lockstep with price, volatility is its mirror
        let close: Vec<f64> = vec![100.0, 102.0, 101.0, 104.0, 103.0, 107.0, 105.0, 110.0];
        let volume: Vec<f64> = close.iter().map(|c| c * 10.0).collect();
        let volatility: Vec<f64> = close.iter().map(|c| 300.0 - c).collect();
        let series = interaction_features(&close, &volume, &volatility);
        assert_eq!(series.len(), 3);

        let (name, price_volume) = &series[0];
        assert_eq!(name, "price_volume_correlation_5d");
        assert!(price_volume[4].is_nan()); // window includes the NaN first change
        assert!((price_volume[5] - 1.0).abs() < 1e-9);

        let (_, vol_volume) = &series[1];
        assert!((vol_volume[4] + 1.0).abs() < 1e-9);
    }
}
