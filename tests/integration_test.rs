mod support;

use serde_json::{json, Value};
use snapshot_export::crypto::TAG_LEN;
use snapshot_export::export::{decode_metadata, Exporter, FileOutcome, MetadataOutcome};
use snapshot_export::property::{DateTime, PropertyMap, PropertyType, PropertyValue, Rect};
use snapshot_export::ErrorKind;
use std::fs;
use std::path::Path;
use support::*;
use tempfile::TempDir;

fn sample_metadata() -> PropertyMap {
    let window: PropertyMap = [
        ("Title", PropertyValue::String("Inbox - Mail".into())),
        ("ProcessId", PropertyValue::UInt32(4312)),
        ("Bounds", PropertyValue::Rect(Rect { x: 10.0, y: 20.0, width: 800.0, height: 600.0 })),
    ]
    .into_iter()
    .collect();

    [
        ("CaptureTime", PropertyValue::DateTime(DateTime::from_unix_millis(1_717_171_717_171))),
        ("IsForeground", PropertyValue::Boolean(true)),
        ("DisplayScale", PropertyValue::Double(1.5)),
        ("Tags", PropertyValue::StringArray(vec!["work".into(), "email".into()])),
        ("Window", PropertyValue::Map(window)),
    ]
    .into_iter()
    .collect()
}

fn expected_json() -> Value {
    json!({
        "CaptureTime": "1717171717171",
        "IsForeground": true,
        "DisplayScale": "1.5",
        "Tags": ["work", "email"],
        "Window": {
            "Title": "Inbox - Mail",
            "ProcessId": "4312",
            "Bounds": ["10", "20", "600", "800"],
        },
    })
}

fn write_snapshot(dir: &Path, name: &str, data: &[u8]) {
    fs::write(dir.join(name), data).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn test_decrypt_snapshot_roundtrip() {
    let image = jpeg(None);
    let file = snapshot_file(CANONICAL_CODE, &image);

    let exporter = Exporter::new(EXPORT_CODE).unwrap();
    let decrypted = exporter.decrypt_snapshot(&file).unwrap();
    assert_eq!(decrypted.as_slice(), image.as_slice());
}

#[test]
fn test_grouped_and_canonical_codes_are_equivalent() {
    let file = snapshot_file(CANONICAL_CODE, &jpeg(None));
    assert!(Exporter::new(EXPORT_CODE).unwrap().decrypt_snapshot(&file).is_ok());
    assert!(Exporter::new(CANONICAL_CODE).unwrap().decrypt_snapshot(&file).is_ok());
    assert!(Exporter::new(&CANONICAL_CODE.to_lowercase()).unwrap().decrypt_snapshot(&file).is_ok());
}

#[test]
fn test_wrong_code_is_authentication_error() {
    let file = snapshot_file(CANONICAL_CODE, &jpeg(None));
    let exporter = Exporter::new("ffffffffffffffffffffffffffffffff").unwrap();
    let err = exporter.decrypt_snapshot(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn test_tampered_content_tag_is_authentication_error() {
    let mut file = snapshot_file(CANONICAL_CODE, &jpeg(None));
    let last = file.len() - 1;
    file[last] ^= 0x40;
    let err = Exporter::new(EXPORT_CODE).unwrap().decrypt_snapshot(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn test_malformed_containers_are_format_errors() {
    let exporter = Exporter::new(EXPORT_CODE).unwrap();
    let good = snapshot_file(CANONICAL_CODE, &jpeg(None));

    let mut wrong_version = good.clone();
    wrong_version[0] = 3;
    assert_eq!(exporter.decrypt_snapshot(&wrong_version).unwrap_err().kind(), ErrorKind::Format);

    assert_eq!(exporter.decrypt_snapshot(&good[..10]).unwrap_err().kind(), ErrorKind::Format);
    assert_eq!(exporter.decrypt_snapshot(&good[..good.len() - 1]).unwrap_err().kind(), ErrorKind::Format);

    // A key blob of the wrong size is rejected before any decryption.
    let content = seal_content(&[7u8; 32], b"x");
    let short_key = assemble(&[0u8; 59], &content);
    assert_eq!(exporter.decrypt_snapshot(&short_key).unwrap_err().kind(), ErrorKind::Format);

    // Content blob smaller than one tag.
    let key_blob = wrap_key(&master_key(CANONICAL_CODE), &[7u8; 32]);
    let tiny = assemble(&key_blob, &[0u8; TAG_LEN - 1]);
    assert_eq!(exporter.decrypt_snapshot(&tiny).unwrap_err().kind(), ErrorKind::Format);
}

#[test]
fn test_decode_metadata_transcodes_property_set() {
    let image = jpeg(Some(&sample_metadata().to_bytes().unwrap()));
    assert_eq!(decode_metadata(&image).unwrap(), Some(expected_json()));
    assert_eq!(decode_metadata(&jpeg(None)).unwrap(), None);
}

#[test]
fn test_export_folder_writes_image_and_metadata() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let out_dir = output.path().join("nested/out");

    let image = jpeg(Some(&sample_metadata().to_bytes().unwrap()));
    write_snapshot(input.path(), "snap_0001", &snapshot_file(CANONICAL_CODE, &image));

    let exporter = Exporter::new(EXPORT_CODE).unwrap();
    let report = exporter.export_folder(input.path(), &out_dir, |_| {}).unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.exported().count(), 1);
    assert_eq!(fs::read(out_dir.join("snap_0001.jpg")).unwrap(), image);
    assert_eq!(read_json(&out_dir.join("snap_0001.json")), expected_json());
}

#[test]
fn test_image_without_metadata_writes_no_sidecar() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_snapshot(input.path(), "plain.bin", &snapshot_file(CANONICAL_CODE, &jpeg(None)));

    let report = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |_| {})
        .unwrap();

    let file = report.get("plain.bin").unwrap();
    assert!(matches!(
        file.outcome,
        FileOutcome::Exported { metadata: MetadataOutcome::Absent, .. }
    ));
    assert!(output.path().join("plain.bin.jpg").exists());
    assert!(!output.path().join("plain.bin.json").exists());
}

#[test]
fn test_corrupted_file_does_not_stop_batch() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let images: Vec<Vec<u8>> = (0..3u8)
        .map(|i| {
            let meta: PropertyMap = [("Index", PropertyValue::UInt8(i))].into_iter().collect();
            jpeg(Some(&meta.to_bytes().unwrap()))
        })
        .collect();
    for (i, image) in images.iter().enumerate() {
        let mut file = snapshot_file(CANONICAL_CODE, image);
        if i == 1 {
            let last = file.len() - 1;
            file[last] ^= 0x01;
        }
        write_snapshot(input.path(), &format!("file{}", i + 1), &file);
    }

    let mut seen = Vec::new();
    let report = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |f| seen.push(f.file_name.clone()))
        .unwrap();

    assert_eq!(seen.len(), 3);
    let failed: Vec<_> = report.failed().map(|f| f.file_name.as_str()).collect();
    assert_eq!(failed, ["file2"]);
    match &report.get("file2").unwrap().outcome {
        FileOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Authentication),
        other => panic!("unexpected outcome {other:?}"),
    }

    for (i, name) in [(0usize, "file1"), (2, "file3")] {
        assert_eq!(fs::read(output.path().join(format!("{name}.jpg"))).unwrap(), images[i]);
        assert_eq!(
            read_json(&output.path().join(format!("{name}.json"))),
            json!({"Index": i.to_string()})
        );
    }
    assert!(!output.path().join("file2.jpg").exists());
    assert!(!output.path().join("file2.json").exists());
}

#[test]
fn test_bad_metadata_keeps_image() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // Truncated property set: declares one entry, carries none.
    let image = jpeg(Some(&[1, 0, 0, 0, 0xAA]));
    write_snapshot(input.path(), "broken_meta", &snapshot_file(CANONICAL_CODE, &image));

    let report = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |_| {})
        .unwrap();

    assert_eq!(report.failed().count(), 0);
    assert_eq!(report.metadata_failed().count(), 1);
    match &report.files[0].outcome {
        FileOutcome::Exported { metadata: MetadataOutcome::Failed(e), .. } => {
            assert_eq!(e.kind(), ErrorKind::Format)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(fs::read(output.path().join("broken_meta.jpg")).unwrap(), image);
    assert!(!output.path().join("broken_meta.json").exists());
}

#[test]
fn test_unsupported_metadata_type_keeps_image() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let meta: PropertyMap = [
        ("Title", PropertyValue::String("ok".into())),
        ("Origin", PropertyValue::Unsupported(PropertyType::Point)),
    ]
    .into_iter()
    .collect();
    let image = jpeg(Some(&meta.to_bytes().unwrap()));
    write_snapshot(input.path(), "pointy", &snapshot_file(CANONICAL_CODE, &image));

    let report = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |_| {})
        .unwrap();

    match &report.files[0].outcome {
        FileOutcome::Exported { metadata: MetadataOutcome::Failed(e), .. } => {
            assert_eq!(e.kind(), ErrorKind::UnsupportedType)
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(output.path().join("pointy.jpg").exists());
    assert!(!output.path().join("pointy.json").exists());
}

#[test]
fn test_existing_outputs_are_overwritten() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let image = jpeg(Some(&sample_metadata().to_bytes().unwrap()));
    write_snapshot(input.path(), "again", &snapshot_file(CANONICAL_CODE, &image));
    fs::write(output.path().join("again.jpg"), b"stale image, longer than the new one ....................................................................").unwrap();
    fs::write(output.path().join("again.json"), b"{}").unwrap();

    Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |_| {})
        .unwrap();

    assert_eq!(fs::read(output.path().join("again.jpg")).unwrap(), image);
    assert_eq!(read_json(&output.path().join("again.json")), expected_json());
}

#[test]
fn test_subdirectories_are_skipped() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::create_dir(input.path().join("thumbnails")).unwrap();
    write_snapshot(input.path(), "only", &snapshot_file(CANONICAL_CODE, &jpeg(None)));

    let report = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(input.path(), output.path(), |_| {})
        .unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file_name, "only");
}

#[test]
fn test_missing_export_folder_is_run_level_error() {
    let output = TempDir::new().unwrap();
    let missing = output.path().join("does-not-exist");
    let err = Exporter::new(EXPORT_CODE)
        .unwrap()
        .export_folder(&missing, output.path(), |_| {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_cli_creates_output_folder_even_when_code_is_invalid() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let out_dir = output.path().join("created/by/cli");

    let run = std::process::Command::new(env!("CARGO_BIN_EXE_snapshot-export"))
        .arg(input.path())
        .arg(&out_dir)
        .arg("abc")
        .output()
        .unwrap();

    assert!(run.status.success());
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("Creating directory:"));
    assert!(stdout.contains("Decryption of snapshot and metadata has failed."));
    assert!(out_dir.is_dir());
}
