//! Normalization and schema mapping throughput

use std::sync::Arc;

use catalog_crawler::application::{ConverterRegistry, SchemaMapper, SpecExtractor};
use catalog_crawler::domain::normalize::{
    normalize_dimension, normalize_price, normalize_product_name, parse_pack_count,
    parse_user_rating,
};
use catalog_crawler::domain::services::RenderingSurface;
use catalog_crawler::domain::{
    Category, SchemaEntry, SchemaPolicy, SchemaRegistry, SerializationType, SpecValue,
};
use catalog_crawler::infrastructure::config::SiteSelectors;
use catalog_crawler::infrastructure::rendering::{DocumentSurface, ReplayPageLoader};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

const NAMES: &[&str] = &[
    "Noctua NH-D15 chromax.black (1204)",
    "ARCTIC P12 PWM PST   5-Pack (312)",
    "Corsair Vengeance 32 GB (2 x 16 GB) DDR5-6000 CL36",
];

fn text_rules(c: &mut Criterion) {
    c.bench_function("product name + pack count", |b| {
        b.iter(|| {
            for name in NAMES {
                let normalized = normalize_product_name(black_box(name));
                black_box(normalized.as_deref().and_then(parse_pack_count));
            }
        });
    });

    c.bench_function("price, rating, dimension", |b| {
        b.iter(|| {
            black_box(normalize_price(black_box("$1,299.00")));
            black_box(parse_user_rating(black_box("(168 Ratings, 4.5 Average)")));
            black_box(normalize_dimension(black_box("+165 mm")));
        });
    });
}

fn schema_mapping(c: &mut Criterion) {
    let category = Category::new("CPUs", "/products/cpu/");
    let mut registry = SchemaRegistry::new();
    registry.insert("cpu", "Core Count", SchemaEntry::new("core_count", SerializationType::Number));
    registry.insert("cpu", "Boost Clock", SchemaEntry::new("boost_clock", SerializationType::Number));
    registry.insert("cpu", "Socket", SchemaEntry::new("socket", SerializationType::Enum));
    let mapper = SchemaMapper::new(
        Arc::new(registry),
        Arc::new(ConverterRegistry::with_builtins()),
        SchemaPolicy::Strict,
    );

    let groups = [
        ("Core Count", SpecValue::Text("8".into())),
        ("Boost Clock", SpecValue::Text("5 GHz".into())),
        ("Socket", SpecValue::List(vec!["AM5".into(), "AM4".into()])),
    ];

    c.bench_function("schema map (3 groups)", |b| {
        b.iter(|| {
            for (label, value) in &groups {
                black_box(mapper.map(&category, label, value).ok());
            }
        });
    });
}

fn detail_extraction(c: &mut Criterion) {
    let url = "https://shop.test/product/bench";
    let html = format!(
        r#"<html><body><div class="block xs-block md-hide specs">{}</div></body></html>"#,
        (0..30)
            .map(|i| format!(
                r#"<div class="group group--spec"><h3 class="group__title">Spec {i}</h3><div class="group__content"><p>{i} mm</p></div></div>"#
            ))
            .collect::<String>()
    );
    let surface = DocumentSurface::new(ReplayPageLoader::new().with_page(url, html));
    let extractor = SpecExtractor::new(SiteSelectors::default());
    let runtime = Runtime::new().expect("tokio runtime");

    c.bench_function("extract 30 spec groups", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut session = surface.open_session().await.expect("session");
            session.navigate(url).await.expect("replayed page");
            black_box(extractor.extract(session.as_ref()).await.ok());
            session.close().await;
        });
    });
}

criterion_group!(benches, text_rules, schema_mapping, detail_extraction);
criterion_main!(benches);
