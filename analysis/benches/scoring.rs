use std::collections::HashMap;

fn main() {
    divan::main();
}

fn stat_line(rounds: u64, kd: f64) -> analysis::stats::PlayerStatLine {
    analysis::stats::PlayerStatLine {
        rounds,
        kd,
        kills_per_minute: kd * 0.55,
        score_per_round: kd * 210.0,
        per_map_kd: (0..12)
            .map(|i| (format!("map-{i}"), kd + i as f64 * 0.01))
            .collect::<HashMap<_, _>>(),
        per_server_kd: (0..30)
            .map(|i| (format!("srv-{i}"), kd + i as f64 * 0.005))
            .collect::<HashMap<_, _>>(),
    }
}

#[divan::bench]
fn stat_compare(bencher: divan::Bencher) {
    let weights = analysis::stats::StatWeights::default();
    let a = stat_line(400, 1.82);
    let b = stat_line(380, 1.79);

    bencher.bench(|| {
        analysis::stats::compare(
            divan::black_box(&weights),
            divan::black_box(&a),
            divan::black_box(&b),
        )
    });
}

#[divan::bench]
fn hour_histograms(bencher: divan::Bencher) {
    let mut a = [0u64; analysis::behavior::HOUR_BUCKETS];
    let mut b = [0u64; analysis::behavior::HOUR_BUCKETS];
    for i in 0..analysis::behavior::HOUR_BUCKETS {
        a[i] = (i * 7 % 13) as u64;
        b[i] = (i * 5 % 11) as u64;
    }

    bencher.bench(|| {
        analysis::behavior::hour_histogram_similarity(divan::black_box(&a), divan::black_box(&b))
    });
}

#[divan::bench(args = [50, 500, 5000])]
fn teammate_circles(bencher: divan::Bencher, size: usize) {
    let inputs = analysis::network::NetworkInputs {
        teammates1: (0..size).map(|i| format!("player-{i}")).collect(),
        teammates2: (size / 2..size + size / 2)
            .map(|i| format!("player-{i}"))
            .collect(),
    };
    let weights = analysis::network::NetworkWeights::default();

    bencher.bench(|| analysis::network::compare(divan::black_box(&weights), divan::black_box(&inputs)));
}
