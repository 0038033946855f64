// tests/forecast_engine.rs
use chrono::{Duration, NaiveDate};
use maple_metrics::draw::sort_descending;
use maple_metrics::ingest::seed::seed_draws;
use maple_metrics::{forecast_at, DrawQuery, DrawRecord, ForecastResult, ProgramType, TrendSignal};
use rand::Rng;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn random_series(rng: &mut impl Rng, n: usize) -> Vec<DrawRecord> {
    let start = ymd(2024, 1, 1);
    let mut out: Vec<DrawRecord> = (0..n)
        .map(|i| DrawRecord {
            id: format!("r{i}"),
            draw_number: i as u32 + 1,
            date: start + Duration::days(rng.random_range(0..400)),
            program_type: ProgramType::ALL[rng.random_range(0..ProgramType::ALL.len())],
            invitations_issued: rng.random_range(0..8000),
            minimum_score: rng.random_range(0..=1200),
            description: None,
        })
        .collect();
    sort_descending(&mut out);
    out
}

#[test]
fn random_series_stay_within_bounds() {
    let mut rng = rand::rng();
    let today = ymd(2025, 3, 1);
    for _ in 0..500 {
        let n = rng.random_range(0..40);
        let series = random_series(&mut rng, n);
        let f = forecast_at(&series, today);

        if n < 3 {
            assert_eq!(f, ForecastResult::empty());
            continue;
        }
        assert!(f.volatility <= 100);
        assert!(f.confidence <= 95);
        let range = f.predicted_range.expect("range");
        assert!(range.low < range.high);
        assert!(range.high - range.low >= 10);
        let next = f.next_estimated_date.expect("date");
        assert!(next >= series[0].date);
    }
}

#[test]
fn forecast_is_deterministic() {
    let mut rng = rand::rng();
    let series = random_series(&mut rng, 20);
    let today = ymd(2025, 3, 1);
    assert_eq!(forecast_at(&series, today), forecast_at(&series, today));
}

#[test]
fn seed_forecast_per_program() {
    let seed = seed_draws();
    let today = ymd(2025, 2, 20);

    let all = forecast_at(&seed, today);
    assert!(all.predicted_range.is_some());
    assert!(all.next_estimated_date.unwrap() > seed[0].date);

    let cec = DrawQuery::program(ProgramType::Cec).apply(&seed);
    assert!(cec.len() >= 3);
    let f = forecast_at(&cec, today);
    let range = f.predicted_range.unwrap();
    let latest = i32::try_from(cec[0].minimum_score).unwrap();
    assert!(range.low <= latest && latest <= range.high);
}

#[test]
fn rising_and_falling_streams() {
    let mk = |scores: &[u32]| -> Vec<DrawRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| DrawRecord {
                id: format!("x{i}"),
                draw_number: 100 - i as u32,
                date: ymd(2024, 6, 1) - Duration::days(14 * i as i64),
                program_type: ProgramType::Cec,
                invitations_issued: 3000,
                minimum_score: s,
                description: None,
            })
            .collect()
    };
    let today = ymd(2024, 6, 3);
    assert_eq!(
        forecast_at(&mk(&[540, 538, 536, 520, 518, 516]), today).trend_signal,
        TrendSignal::Rising
    );
    assert_eq!(
        forecast_at(&mk(&[500, 502, 504, 520, 522, 524]), today).trend_signal,
        TrendSignal::Falling
    );
}
