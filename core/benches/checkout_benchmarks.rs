use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use promo_checkout::models::{AddOnCatalog, AddOnOrderItem, CouponState, DiscountType, PackageCatalog, Track};
use promo_checkout::payment::messages::interpret;
use promo_checkout::payment::{FrameMessage, IdempotencyGuard, OriginAllowList};
use promo_checkout::{CheckoutConfig, DiscountEngine, Money};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::runtime::Runtime;

// --- Sample carts ---
fn tracks(n: usize) -> Vec<Track> {
  (0..n)
    .map(|i| Track {
      id: format!("track-{}", i),
      title: format!("Song {}", i),
      artist: "Bench Artist".to_string(),
      image_url: String::new(),
      url: format!("https://open.spotify.com/track/{}", i),
      artist_profile_url: None,
    })
    .collect()
}

fn selections(n: usize) -> BTreeMap<usize, String> {
  let ids = ["breakthrough", "momentum", "dominate", "unstoppable", "legendary"];
  (0..n).map(|i| (i, ids[i % ids.len()].to_string())).collect()
}

fn bench_pricing(c: &mut Criterion) {
  let mut group = c.benchmark_group("Pricing");
  let engine = DiscountEngine::default();
  let catalog = PackageCatalog::default();
  let add_ons: Vec<AddOnOrderItem> = AddOnCatalog::default().all().iter().map(AddOnOrderItem::from).collect();
  let coupon = CouponState {
    id: "c-1".to_string(),
    code: "SAVE10".to_string(),
    discount_type: DiscountType::Flat,
    discount_value: 10.0,
    calculated_discount: Money::from_whole(10),
  };

  for cart_size in [1usize, 5, 25].iter() {
    let tracks = tracks(*cart_size);
    let selections = selections(*cart_size);
    group.throughput(Throughput::Elements(*cart_size as u64));

    group.bench_with_input(BenchmarkId::new("order_items", cart_size), cart_size, |b, _| {
      b.iter(|| engine.order_items(&tracks, &selections, &catalog))
    });

    let items = engine.order_items(&tracks, &selections, &catalog).unwrap();
    group.bench_with_input(BenchmarkId::new("compute_totals", cart_size), cart_size, |b, _| {
      b.iter(|| engine.compute_totals(&items, &add_ons, Some(&coupon), Money::from_whole(20)))
    });
  }
  group.finish();
}

fn bench_completion_messages(c: &mut Criterion) {
  let mut group = c.benchmark_group("CompletionMessages");
  let config = CheckoutConfig::default();
  let allow_list = OriginAllowList::new(&config.allowed_message_origins);

  let trusted = FrameMessage::new(
    "https://test.authorize.net",
    json!({ "type": "PAYMENT_COMPLETE", "response": { "responseCode": "1", "transId": "60123" } }),
  );
  let stringified = FrameMessage::new("https://test.authorize.net", json!(trusted.data.to_string()));
  let untrusted = FrameMessage::new("https://evil.example", trusted.data.clone());

  group.bench_function("trusted", |b| b.iter(|| interpret(&trusted, &allow_list)));
  group.bench_function("stringified", |b| b.iter(|| interpret(&stringified, &allow_list)));
  group.bench_function("untrusted", |b| b.iter(|| interpret(&untrusted, &allow_list)));
  group.finish();
}

fn bench_idempotency_guard(c: &mut Criterion) {
  let mut group = c.benchmark_group("IdempotencyGuard");
  let rt = Runtime::new().unwrap();

  group.bench_function("acquire_release", |b| {
    let guard = IdempotencyGuard::new();
    let mut n = 0u64;
    b.iter(|| {
      n += 1;
      let permit = guard.try_acquire(&format!("txn-{}", n));
      drop(permit);
    })
  });

  // Duplicate signals arriving from concurrent tasks.
  group.bench_function("concurrent_duplicates", |b| {
    b.to_async(&rt).iter(|| async {
      let guard = IdempotencyGuard::new();
      let handles: Vec<_> = (0..8)
        .map(|_| {
          let guard = guard.clone();
          tokio::spawn(async move { guard.try_acquire("txn-dup").is_ok() })
        })
        .collect();
      let mut admitted = 0;
      for handle in handles {
        if handle.await.unwrap_or(false) {
          admitted += 1;
        }
      }
      admitted
    })
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_pricing,
  bench_completion_messages,
  bench_idempotency_guard
);
criterion_main!(benches);
