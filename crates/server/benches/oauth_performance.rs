use criterion::{Criterion, black_box, criterion_group, criterion_main};
use open_badges_oauth::oauth2::{
    AuthorizationCode,
    memory::MemoryCodeStore,
    pkce::{s256_challenge, verify_code_verifier},
    scope,
    store::CodeStore,
};
use time::{Duration, OffsetDateTime};

const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

// CI-friendly benchmark configuration
fn is_ci_mode() -> bool {
    std::env::var("CI").is_ok() || std::env::var("QUICK_BENCH").is_ok()
}

fn sample_code(code: String) -> AuthorizationCode {
    AuthorizationCode {
        code,
        client_id: "bench-client".to_string(),
        redirect_uri: "https://app.example/cb".to_string(),
        scope: scope::OFFLINE_ACCESS.to_string(),
        state: None,
        code_challenge: s256_challenge(VERIFIER),
        code_challenge_method: "S256".to_string(),
        user_id: "user_1".to_string(),
        user_name: "Demo User".to_string(),
        expires_at: OffsetDateTime::now_utc() + Duration::minutes(10),
    }
}

fn benchmark_pkce(c: &mut Criterion) {
    let challenge = s256_challenge(VERIFIER);

    c.bench_function("pkce_s256_challenge", |b| {
        b.iter(|| black_box(s256_challenge(black_box(VERIFIER))));
    });

    c.bench_function("pkce_verify_s256", |b| {
        b.iter(|| black_box(verify_code_verifier(black_box(VERIFIER), &challenge, "S256")));
    });

    c.bench_function("pkce_verify_plain", |b| {
        b.iter(|| black_box(verify_code_verifier(black_box(VERIFIER), VERIFIER, "plain")));
    });
}

fn benchmark_code_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("code_store_insert_redeem", |b| {
        let store = MemoryCodeStore::new();
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let code = format!("code-{counter}");
            rt.block_on(async {
                store.insert(sample_code(code.clone())).await.unwrap();
                let redeemed = store
                    .redeem(&code, OffsetDateTime::now_utc(), &|_| Ok(()))
                    .await;
                black_box(redeemed)
            })
        });
    });

    c.bench_function("code_store_purge_expired", |b| {
        let store = MemoryCodeStore::new();
        let batch = if is_ci_mode() { 100 } else { 1000 };
        rt.block_on(async {
            for i in 0..batch {
                store.insert(sample_code(format!("live-{i}"))).await.unwrap();
            }
        });
        b.iter(|| rt.block_on(store.purge_expired(black_box(OffsetDateTime::now_utc()))));
    });
}

fn benchmark_scope_filtering(c: &mut Criterion) {
    let requested = format!(
        "{} {} unknown:scope {}",
        scope::CREDENTIAL_READONLY,
        scope::PROFILE_READONLY,
        scope::OFFLINE_ACCESS
    );
    c.bench_function("scope_filter_recognized", |b| {
        b.iter(|| black_box(scope::filter_recognized(black_box(&requested))));
    });
}

criterion_group!(
    benches,
    benchmark_pkce,
    benchmark_code_store,
    benchmark_scope_filtering
);
criterion_main!(benches);
