//! 工具函数性能基准测试

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use smartlinker::services::{InputKind, detect_input};
use smartlinker::utils::url_validator::validate_url;
use smartlinker::utils::{generate_random_code, is_valid_short_code, is_valid_slug, slugify};

// ============== is_valid_short_code 基准测试 ==============

fn bench_is_valid_short_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/is_valid_short_code");

    group.bench_function("valid_simple", |b| {
        b.iter(|| {
            assert!(is_valid_short_code("abc123"));
        });
    });

    group.bench_function("invalid_empty", |b| {
        b.iter(|| {
            assert!(!is_valid_short_code(""));
        });
    });

    group.bench_function("invalid_special_chars", |b| {
        b.iter(|| {
            assert!(!is_valid_short_code("'; DROP TABLE--"));
        });
    });

    let too_long_code = "a".repeat(11);
    group.bench_function("invalid_too_long", |b| {
        b.iter(|| {
            assert!(!is_valid_short_code(&too_long_code));
        });
    });

    group.finish();
}

// ============== generate_random_code 基准测试 ==============

fn bench_generate_random_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/generate_random_code");

    for length in [4, 6, 8, 10] {
        group.bench_with_input(BenchmarkId::new("length", length), &length, |b, &length| {
            b.iter(|| {
                let code = generate_random_code(length);
                assert_eq!(code.len(), length);
            });
        });
    }

    group.finish();
}

// ============== slugify 基准测试 ==============

fn bench_slugify(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/slugify");

    group.bench_function("ascii_title", |b| {
        b.iter(|| {
            assert_eq!(slugify("One More Time"), "one-more-time");
        });
    });

    group.bench_function("accented_title", |b| {
        b.iter(|| {
            assert_eq!(slugify("Beyoncé & Jay"), "beyonce-and-jay");
        });
    });

    let long_title = "Midnight Drive (Extended Club Mix) ".repeat(20);
    group.bench_function("long_title", |b| {
        b.iter(|| {
            assert!(is_valid_slug(&slugify(&long_title)));
        });
    });

    group.finish();
}

// ============== validate_url 基准测试 ==============

fn bench_validate_url(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils/validate_url");

    group.bench_function("valid_https", |b| {
        b.iter(|| {
            assert!(validate_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").is_ok());
        });
    });

    group.bench_function("invalid_dangerous_protocol", |b| {
        b.iter(|| {
            assert!(validate_url("javascript:alert(1)").is_err());
        });
    });

    group.bench_function("invalid_empty", |b| {
        b.iter(|| {
            assert!(validate_url("").is_err());
        });
    });

    group.finish();
}

// ============== detect_input 基准测试 ==============

fn bench_detect_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("platform_links/detect_input");

    let cases = [
        ("isrc", "USUM71703861", InputKind::Isrc),
        ("upc", "602557383385", InputKind::Upc),
        (
            "spotify",
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
            InputKind::SpotifyUrl,
        ),
        (
            "deezer",
            "https://www.deezer.com/track/3135556",
            InputKind::DeezerUrl,
        ),
    ];

    for (name, input, expected) in cases {
        group.bench_function(name, |b| {
            b.iter(|| {
                assert_eq!(detect_input(input).unwrap(), expected);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_is_valid_short_code,
    bench_generate_random_code,
    bench_slugify,
    bench_validate_url,
    bench_detect_input,
);
criterion_main!(benches);
