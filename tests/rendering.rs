use std::collections::HashMap;
use std::io::Cursor;

use chrono::NaiveDate;
use gearmotor_qc::fetch::FetchError;
use gearmotor_qc::fonts;
use gearmotor_qc::layout::{ImageOutcome, PageGeometry};
use gearmotor_qc::record::{InspectionRecord, RawTerm, SerialNumber};
use gearmotor_qc::report::{RenderedDocument, ReportAssets, ReportBuilder};
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb, Rgba};

const SKIP_HINT: &str =
    "report fonts missing. Set QC_REPORT_FONTS_DIR or copy assets/fonts next to the binary.";

fn png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode fixture png");
    bytes.into_inner()
}

fn gradient(width: u32, height: u32) -> Vec<u8> {
    png(DynamicImage::ImageRgb8(ImageBuffer::from_fn(
        width,
        height,
        |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 96]),
    )))
}

fn translucent_logo() -> Vec<u8> {
    png(DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
        120,
        40,
        Rgba([10, 60, 160, 128]),
    )))
}

fn fixtures() -> HashMap<String, Vec<u8>> {
    let mut files = HashMap::new();
    files.insert("motor.png".to_owned(), gradient(400, 300));
    files.insert("gear.png".to_owned(), gradient(300, 400));
    files.insert("current.png".to_owned(), gradient(320, 240));
    files.insert("sound.png".to_owned(), gradient(240, 240));
    files.insert("assembly.png".to_owned(), gradient(400, 300));
    files.insert("broken.png".to_owned(), b"\x89PNG truncated".to_vec());
    files
}

fn sample_record(with_broken_photo: bool) -> InspectionRecord {
    let mut record = InspectionRecord {
        serial: Some(SerialNumber::new("SAS20250124_093005")),
        date: Some("2025-01-24".to_owned()),
        product_type: Some("RF helical gear motor".to_owned()),
        motor_nameplate: Some("0.75 kW 4P".to_owned()),
        motor_current: Some("1.8".to_owned()),
        gear_ratio: Some("1:20".to_owned()),
        gear_sound: Some("62".to_owned()),
        oil_type: Some("VG220".to_owned()),
        oil_liters: Some("0.6".to_owned()),
        oil_filled: Some(true),
        check_complete: Some("Complete".to_owned()),
        warranty: Some(RawTerm::Months(18)),
        inspector: Some("QC001".to_owned()),
        ..InspectionRecord::default()
    };
    for (slot, source) in [
        ("rfks_nameplate_motor", "motor.png"),
        ("rfks_nameplate_gear", "gear.png"),
        ("motor_current_img", "current.png"),
        ("gear_sound_img", "sound.png"),
        ("assembly_img", "assembly.png"),
    ] {
        record
            .images
            .insert(slot.to_owned(), Some(source.to_owned()));
    }
    if with_broken_photo {
        record
            .images
            .insert("controller_img".to_owned(), Some("broken.png".to_owned()));
    }
    record
}

fn with_sample_builder<T>(
    geometry: PageGeometry,
    run: impl FnOnce(&ReportBuilder<'_>) -> T,
) -> Option<T> {
    if !fonts::fonts_available() {
        return None;
    }
    let font_family = fonts::load_font_family().expect("load report fonts");
    let assets = ReportAssets::new(font_family)
        .with_logo(translucent_logo())
        .with_badge(b"not an image".to_vec());

    let files = fixtures();
    let fetcher = move |location: &str| {
        files
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::UnsupportedScheme(location.to_owned()))
    };

    let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    let builder = ReportBuilder::new(&assets, &fetcher)
        .with_geometry(geometry)
        .with_today(today)
        .with_generated_at(today.and_hms_opt(9, 30, 0).unwrap());
    Some(run(&builder))
}

fn render_sample(record: &InspectionRecord) -> Option<RenderedDocument> {
    with_sample_builder(PageGeometry::a4(), |builder| {
        builder.render(record).expect("render sample report")
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[test]
fn renders_a_multi_page_pdf() {
    let Some(document) = render_sample(&sample_record(false)) else {
        eprintln!("Skipping renders_a_multi_page_pdf: {SKIP_HINT}");
        return;
    };
    assert!(document.bytes.starts_with(b"%PDF"));
    assert!(document.page_count >= 2, "summary page plus photo pages");
    assert_eq!(document.images.len(), 5);
    assert!(document.images.iter().all(|report| report.is_placed()));
    assert_eq!(document.images[0].label, "Name plate : Motor");
    assert_eq!(document.images[1].label, "Name plate : Gear");
}

#[test]
fn broken_photo_is_left_out_without_failing_the_report() {
    let Some(document) = render_sample(&sample_record(true)) else {
        eprintln!("Skipping broken_photo_is_left_out_without_failing_the_report: {SKIP_HINT}");
        return;
    };
    assert_eq!(document.images.len(), 6);
    assert_eq!(
        document
            .images
            .iter()
            .filter(|report| report.is_placed())
            .count(),
        5
    );
    let broken = document
        .images
        .iter()
        .find(|report| report.label == "Controller")
        .expect("controller photo is reported");
    assert!(matches!(broken.outcome, ImageOutcome::Skipped { .. }));
}

#[test]
fn record_without_photos_renders_only_the_summary_page() {
    let mut record = sample_record(false);
    record.images.clear();
    let Some(document) = render_sample(&record) else {
        eprintln!("Skipping record_without_photos_renders_only_the_summary_page: {SKIP_HINT}");
        return;
    };
    assert_eq!(document.page_count, 1);
    assert!(document.images.is_empty());
}

#[test]
fn repeated_renders_produce_the_same_content() {
    let record = sample_record(true);
    let Some((prepared, rendered)) = with_sample_builder(PageGeometry::a4(), |builder| {
        let prepared_twice = [
            builder.prepare(&record).expect("prepare report"),
            builder.prepare(&record).expect("prepare report"),
        ];
        let rendered_twice = [
            builder.render(&record).expect("render report"),
            builder.render(&record).expect("render report"),
        ];
        (prepared_twice, rendered_twice)
    }) else {
        eprintln!("Skipping repeated_renders_produce_the_same_content: {SKIP_HINT}");
        return;
    };

    assert_eq!(prepared[0].lines(), prepared[1].lines());
    assert_eq!(prepared[0].page_count(), prepared[1].page_count());
    assert_eq!(prepared[0].layout(), prepared[1].layout());

    assert_eq!(rendered[0].page_count, rendered[1].page_count);
    assert_eq!(rendered[0].page_count, prepared[0].page_count());
    assert_eq!(rendered[0].images, rendered[1].images);
}

#[test]
fn page_size_follows_the_geometry() {
    let geometry = PageGeometry::a4().with_page_size(210.0, 400.0);
    let record = sample_record(false);
    let Some(document) = with_sample_builder(geometry, |builder| {
        builder.render(&record).expect("render tall report")
    }) else {
        eprintln!("Skipping page_size_follows_the_geometry: {SKIP_HINT}");
        return;
    };

    // 400 mm is 1133.86 pt; A4 would be 841.89 pt tall.
    assert!(contains(&document.bytes, b"1133.86"));
    assert!(!contains(&document.bytes, b"841.89"));
    assert!(document.images.iter().all(|report| report.is_placed()));
}
