use ping_sentry::indicator::sma::Sma;

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn warms_up_after_period_closes() {
    let mut sma = Sma::new(4);
    for close in [10.0, 11.0, 12.0] {
        assert_eq!(sma.push(close), None);
        assert!(!sma.is_ready());
        assert_eq!(sma.value(), None);
    }
    assert!(close_enough(sma.push(13.0).unwrap(), 11.5));
    assert!(sma.is_ready());
    assert_eq!(sma.period(), 4);
}

#[test]
fn period_one_tracks_last_close() {
    let mut sma = Sma::new(1);
    for close in [0.25, 7.5, 3.0] {
        assert_eq!(sma.push(close), Some(close));
    }
}

#[test]
fn running_mean_matches_a_fresh_average() {
    let closes: Vec<f64> = (0..5_000u32)
        .map(|i| 30_000.0 + (i as f64 * 0.37).sin() * 250.0)
        .collect();
    let mut sma = Sma::new(20);
    for (i, close) in closes.iter().enumerate() {
        let Some(mean) = sma.push(*close) else {
            continue;
        };
        let window = &closes[i + 1 - 20..=i];
        let expected = window.iter().sum::<f64>() / 20.0;
        assert!(
            (mean - expected).abs() < 1e-6,
            "mean drifted at {}: {} vs {}",
            i,
            mean,
            expected
        );
    }
}

#[test]
fn population_std_dev_over_window() {
    let mut sma = Sma::new(4);
    assert_eq!(sma.std_dev(), None);
    for close in [2.0, 4.0, 4.0, 4.0] {
        sma.push(close);
    }
    // mean 3.5, squared deviations 2.25 + 0.25 * 3 = 3.0, / 4
    assert!(close_enough(sma.std_dev().unwrap(), 0.75f64.sqrt()));

    sma.push(4.0);
    assert!(close_enough(sma.std_dev().unwrap(), 0.0));
}
