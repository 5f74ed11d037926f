use romext::carver::{CarveConfig, Carver, NamingPolicy};
use romext::signatures::{DEFAULT_MAX_PAYLOAD, FormatTag, SignatureTable};
use std::fs;

fn jpeg(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE0];
    out.extend_from_slice(body);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn images_carver() -> Carver {
    Carver::new(SignatureTable::images(), CarveConfig::default())
}

#[test]
fn blob_without_signatures_carves_nothing() {
    let blob = vec![0x42u8; 4096];
    let (payloads, summary) = images_carver().carve(&blob);
    assert!(payloads.is_empty());
    assert_eq!(summary.found, 0);
    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.rejected, 0);
}

#[test]
fn embedded_jpeg_is_carved_byte_for_byte() {
    let payload = jpeg(b"scan data goes here");
    let mut blob = vec![0x00u8; 300];
    blob.extend_from_slice(&payload);
    blob.extend_from_slice(&[0x00u8; 128]);

    let (payloads, summary) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].start, 300);
    assert_eq!(payloads[0].end, 300 + payload.len());
    assert_eq!(payloads[0].bytes, payload.as_slice());
    assert_eq!(summary.extracted, 1);
}

#[test]
fn filler_blob_scenario_extracts_one_fifteen_byte_jpeg() {
    let mut blob = vec![0x00u8; 50];
    blob.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    blob.extend_from_slice(b"JFIF_DATA");
    blob.extend_from_slice(&[0xFF, 0xD9]);
    blob.extend_from_slice(&[0x00u8; 20]);

    let (payloads, _) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].start, 50);
    assert_eq!(payloads[0].end - payloads[0].start, 15);
    assert_eq!(payloads[0].format, FormatTag::Jpeg);
}

#[test]
fn back_to_back_jpegs_partition_the_region_exactly() {
    let first = jpeg(b"first image body");
    let second = jpeg(b"second");
    let mut blob = first.clone();
    blob.extend_from_slice(&second);

    let (payloads, summary) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].start, 0);
    assert_eq!(payloads[0].end, first.len());
    assert_eq!(payloads[1].start, first.len());
    assert_eq!(payloads[1].end, blob.len());
    assert_eq!(payloads[0].bytes, first.as_slice());
    assert_eq!(payloads[1].bytes, second.as_slice());
    assert_eq!(summary.rejected, 0);
}

#[test]
fn unterminated_jpeg_is_rejected_and_counted() {
    let mut blob = vec![0x00u8; 10];
    blob.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    blob.extend_from_slice(b"never ends");

    let (payloads, summary) = images_carver().carve(&blob);
    assert!(payloads.is_empty());
    assert_eq!(summary.found, 1);
    assert_eq!(summary.rejected, 1);
}

#[test]
fn bmp_with_oversized_length_is_rejected_never_sliced() {
    let mut blob = b"BM".to_vec();
    blob.extend_from_slice(&100_000u32.to_le_bytes());
    blob.extend_from_slice(&[0u8; 64]);

    let (payloads, summary) = images_carver().carve(&blob);
    assert!(payloads.is_empty());
    assert_eq!(summary.rejected, 1);
}

#[test]
fn bmp_declared_length_bounds_the_payload() {
    let mut bmp = b"BM".to_vec();
    bmp.extend_from_slice(&64u32.to_le_bytes());
    bmp.extend_from_slice(&[0x10u8; 58]);
    let mut blob = bmp.clone();
    blob.extend_from_slice(&[0xEEu8; 32]);

    let (payloads, _) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].bytes, bmp.as_slice());
    assert_eq!(payloads[0].format, FormatTag::Bmp);
}

#[test]
fn signature_recurring_inside_a_payload_is_suppressed() {
    // a second SOI inside the accepted range (an embedded thumbnail) must
    // not be re-extracted
    let mut blob = vec![0xFF, 0xD8, 0xFF, 0xE0];
    blob.extend_from_slice(&[0x01u8; 20]);
    blob.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    blob.extend_from_slice(&[0x02u8; 20]);
    blob.extend_from_slice(&[0xFF, 0xD9]);

    let (payloads, summary) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].start, 0);
    assert_eq!(payloads[0].end, blob.len());
    assert_eq!(summary.found, 2);
    assert_eq!(summary.rejected, 0);
}

#[test]
fn png_without_iend_is_capped_at_the_configured_ceiling() {
    let mut blob = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    blob.extend_from_slice(&[0x33u8; 500]);

    // default ceiling is far larger than the blob, so the payload runs to
    // the end; the default itself is pinned
    assert_eq!(DEFAULT_MAX_PAYLOAD, 5_000_000);
    let (payloads, _) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].end, blob.len());

    // a smaller configured ceiling truncates the guess
    let capped = Carver::new(
        SignatureTable::images(),
        CarveConfig {
            max_payload_size: 100,
            naming: NamingPolicy::Sequential,
        },
    );
    let (payloads, _) = capped.carve(&blob);
    assert_eq!(payloads[0].end, 100);
}

#[test]
fn png_with_iend_ends_after_the_trailer() {
    let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0x44u8; 90]);
    png.extend_from_slice(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]);
    let mut blob = png.clone();
    blob.extend_from_slice(&[0xAAu8; 40]);

    let (payloads, _) = images_carver().carve(&blob);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].bytes, png.as_slice());
}

#[test]
fn sequential_naming_uses_one_global_zero_padded_counter() {
    let mut blob = jpeg(b"aaa");
    let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]);
    blob.extend_from_slice(&png);
    blob.extend_from_slice(&jpeg(b"bbb"));

    let (payloads, _) = images_carver().carve(&blob);
    let names: Vec<&str> = payloads.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["image_0000.jpg", "image_0001.png", "image_0002.jpg"]);
}

#[test]
fn name_hint_mode_picks_up_a_nearby_filename() {
    let carver = Carver::new(
        SignatureTable::jpeg_only(),
        CarveConfig {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            naming: NamingPolicy::NameHint { lookback: 200 },
        },
    );

    let mut blob = vec![0x00u8; 40];
    blob.extend_from_slice(b"boot_logo-7.jpg");
    blob.extend_from_slice(&[0x00u8; 30]);
    let hinted_start = blob.len();
    blob.extend_from_slice(&jpeg(b"logo bits"));
    blob.extend_from_slice(&[0x00u8; 600]);
    blob.extend_from_slice(&jpeg(b"anonymous"));

    let (payloads, _) = carver.carve(&blob);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].start, hinted_start);
    assert_eq!(payloads[0].name, "boot_logo-7.jpg");
    // no hint within the lookback window: synthetic fallback
    assert_eq!(payloads[1].name, "image_0001.jpg");
}

#[test]
fn name_hint_outside_the_lookback_window_is_ignored() {
    let carver = Carver::new(
        SignatureTable::jpeg_only(),
        CarveConfig {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            naming: NamingPolicy::NameHint { lookback: 16 },
        },
    );

    let mut blob = b"far_away.jpg".to_vec();
    blob.extend_from_slice(&[0x00u8; 100]);
    blob.extend_from_slice(&jpeg(b"body"));

    let (payloads, _) = carver.carve(&blob);
    assert_eq!(payloads[0].name, "image_0000.jpg");
}

#[test]
fn carving_twice_writes_identical_files_in_the_same_order() {
    let mut blob = jpeg(b"one");
    blob.extend_from_slice(&[0u8; 33]);
    blob.extend_from_slice(&jpeg(b"two"));

    let carver = images_carver();
    let dir_a = tempfile::tempdir().expect("tempdir");
    let dir_b = tempfile::tempdir().expect("tempdir");

    let report_a = carver.carve_to_dir(&blob, dir_a.path()).expect("carve a");
    let report_b = carver.carve_to_dir(&blob, dir_b.path()).expect("carve b");

    assert_eq!(report_a.summary, report_b.summary);
    assert_eq!(report_a.written.len(), 2);
    for (a, b) in report_a.written.iter().zip(&report_b.written) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(fs::read(a).expect("read a"), fs::read(b).expect("read b"));
    }
}

#[test]
fn carve_to_dir_reports_zero_extractions_without_error() {
    let blob = vec![0u8; 256];
    let dir = tempfile::tempdir().expect("tempdir");
    let report = images_carver()
        .carve_to_dir(&blob, dir.path())
        .expect("carve");
    assert_eq!(report.summary.extracted, 0);
    assert!(report.written.is_empty());
}
