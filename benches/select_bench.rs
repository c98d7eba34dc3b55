use criterion::{criterion_group, criterion_main, Criterion};
use wikicard::image::select_canonical;

// Image selection scans the full page content once per embedded image; this
// measures a mid-sized article with mostly-absent images.
fn bench_select_canonical(c: &mut Criterion) {
    let mut content = String::new();
    for i in 0..500 {
        content.push_str(&format!(
            "paragraph {} with filler text about nothing in particular. ",
            i
        ));
    }
    content.push_str("File:Winner.jpg");

    let images: Vec<String> = (0..50)
        .map(|i| format!("File:Absent{}.jpg", i))
        .chain(std::iter::once("File:Winner.jpg".to_string()))
        .collect();

    c.bench_function("select_canonical", |b| {
        b.iter(|| select_canonical(&content, &images, "Finalised.jpg"))
    });
}

criterion_group!(benches, bench_select_canonical);
criterion_main!(benches);
