use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pz_core::{Kernel, PixelFormat, PixelView};
use pz_metric::{CropConfig, compare_columns, find_crop, try_compare_rows_with};

fn test_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 4);
    for i in 0..(width * height * 4) {
        data.push((i % 251) as u8);
    }
    data
}

fn bench_compare_rows(c: &mut Criterion) {
    let width = 1920usize;
    let height = 4usize;
    let data = test_pixels(width, height);
    let view = PixelView::packed(width, height, PixelFormat::Rgba8, &data).expect("valid view");

    for (name, kernel) in [
        ("compare_rows_scalar_1920", Kernel::Scalar),
        ("compare_rows_detected_1920", Kernel::detect()),
    ] {
        c.bench_function(name, |b| {
            b.iter(|| {
                let d = try_compare_rows_with(kernel, black_box(&view), 0, 3).expect("in range");
                black_box(d);
            });
        });
    }
}

fn bench_compare_columns(c: &mut Criterion) {
    let width = 64usize;
    let height = 1080usize;
    let data = test_pixels(width, height);
    let view = PixelView::packed(width, height, PixelFormat::Rgb8, &data).expect("valid view");

    c.bench_function("compare_columns_rgb_1080", |b| {
        b.iter(|| black_box(compare_columns(black_box(&view), 0, 63, 0, height)));
    });
}

fn bench_find_crop(c: &mut Criterion) {
    let width = 1280usize;
    let height = 720usize;
    let mut data = vec![255u8; width * height * 4];
    let inner = test_pixels(width - 200, height - 100);
    let inner_row = (width - 200) * 4;
    for y in 0..(height - 100) {
        let dst = (y + 50) * width * 4 + 100 * 4;
        data[dst..dst + inner_row].copy_from_slice(&inner[y * inner_row..(y + 1) * inner_row]);
    }
    let view = PixelView::packed(width, height, PixelFormat::Rgba8, &data).expect("valid view");
    let cfg = CropConfig::default();

    c.bench_function("find_crop_1280x720_framed", |b| {
        b.iter(|| black_box(find_crop(black_box(&view), &cfg)));
    });
}

criterion_group!(benches, bench_compare_rows, bench_compare_columns, bench_find_crop);
criterion_main!(benches);
