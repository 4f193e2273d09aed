// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use rstest::rstest;

use super::{generate_container, parse_container, peek_text_mode, FormatError, WriteOptions};
use crate::model::fixtures::{eid, fid, image, shape, text};
use crate::model::{EmbeddedResource, ExportPreference, ResourceData, TextMode, Theme};
use crate::scene::Scene;

fn sample_scene() -> Scene {
    let mut scene = Scene::new();
    scene.upsert(shape("s1", 3));

    let mut note = text("t1", 2, "see [[other-doc|details]]");
    note.text_mut().unwrap().set_display("see details");
    scene.upsert(note);

    let mut gone = shape("s2", 5);
    gone.set_deleted(true);
    scene.upsert(gone);

    scene.upsert(image("img1", 1, "f1"));
    scene
        .resources_mut()
        .insert(fid("f1"), EmbeddedResource::new_file(fid("f1")));
    scene
        .links_mut()
        .insert(eid("t1"), "[[other-doc|details]]".to_owned());
    scene.view_mut().set_theme(Theme::Dark);
    scene.view_mut().set_scroll(10.0, -4.5);
    scene.set_text_mode(TextMode::Resolved);
    scene
}

#[rstest]
#[case::uncompressed(false)]
#[case::compressed(true)]
fn container_round_trips_scene(#[case] compress: bool) {
    let scene = sample_scene();
    let options = WriteOptions {
        compress,
        export_override: None,
    };

    let serialized = generate_container(&scene, &options).unwrap();
    let parsed = parse_container(&serialized).unwrap();

    assert!(!parsed.legacy);
    assert_eq!(parsed.compressed, compress);
    assert_eq!(parsed.scene, scene);
}

#[test]
fn compressed_and_uncompressed_encodings_agree() {
    let scene = sample_scene();

    let plain = generate_container(
        &scene,
        &WriteOptions {
            compress: false,
            export_override: None,
        },
    )
    .unwrap();
    let packed = generate_container(
        &scene,
        &WriteOptions {
            compress: true,
            export_override: None,
        },
    )
    .unwrap();

    assert_ne!(plain, packed);
    assert_eq!(
        parse_container(&plain).unwrap().scene,
        parse_container(&packed).unwrap().scene
    );
}

#[test]
fn raw_text_survives_round_trip_in_resolved_mode() {
    let scene = sample_scene();
    let serialized = generate_container(
        &scene,
        &WriteOptions {
            compress: false,
            export_override: None,
        },
    )
    .unwrap();

    let parsed = parse_container(&serialized).unwrap();
    let note = parsed.scene.get(&eid("t1")).unwrap();
    assert_eq!(note.text().unwrap().raw(), "see [[other-doc|details]]");
    assert_eq!(note.text().unwrap().display(), "see details");
}

#[test]
fn multiline_raw_text_round_trips() {
    let mut scene = Scene::new();
    scene.upsert(text("t1", 1, "first line\nsecond line"));
    scene.upsert(text("t2", 1, "solo"));

    let serialized = generate_container(&scene, &WriteOptions::default()).unwrap();
    let parsed = parse_container(&serialized).unwrap();

    assert_eq!(
        parsed.scene.get(&eid("t1")).unwrap().text().unwrap().raw(),
        "first line\nsecond line"
    );
    assert_eq!(parsed.scene.get(&eid("t2")).unwrap().text().unwrap().raw(), "solo");
}

#[test]
fn header_records_text_mode_and_export_override() {
    let scene = sample_scene();
    let serialized = generate_container(
        &scene,
        &WriteOptions {
            compress: false,
            export_override: Some(ExportPreference::Svg),
        },
    )
    .unwrap();

    assert!(serialized.starts_with("---\nproteus-doc: resolved\nproteus-export: svg\n---\n"));

    let parsed = parse_container(&serialized).unwrap();
    assert_eq!(parsed.scene.text_mode(), TextMode::Resolved);
    assert_eq!(parsed.export_override, Some(ExportPreference::Svg));

    assert_eq!(peek_text_mode(&serialized).unwrap(), TextMode::Resolved);
}

#[test]
fn legacy_bare_snapshot_is_read_as_raw_mode() {
    let legacy = r#"{
        "elements": [
            {"id": "t1", "version": 4, "type": "text", "text": "hello [[ref]]"},
            {"id": "s1", "version": 1, "type": "shape"}
        ]
    }"#;

    let parsed = parse_container(legacy).unwrap();
    assert!(parsed.legacy);
    assert_eq!(parsed.scene.text_mode(), TextMode::Raw);
    assert_eq!(parsed.scene.elements().len(), 2);

    // with no element-text section, raw mirrors the stored text
    let note = parsed.scene.get(&eid("t1")).unwrap();
    assert_eq!(note.text().unwrap().raw(), "hello [[ref]]");
    assert_eq!(note.text().unwrap().display(), "hello [[ref]]");
}

#[test]
fn missing_data_section_is_a_parse_error() {
    let text = "---\nproteus-doc: raw\n---\n\n# Element Text\n\nhello ^t1\n";
    let err = parse_container(text).unwrap_err();
    assert!(matches!(err, FormatError::MissingDataSection));
}

#[test]
fn unknown_fence_encoding_is_rejected() {
    let text = "# Document Data\n```zip\nAAAA\n```\n";
    let err = parse_container(text).unwrap_err();
    assert!(matches!(err, FormatError::UnknownEncoding { .. }));
}

#[test]
fn corrupt_compressed_block_reports_base64_error() {
    let text = "# Document Data\n```compressed-json\n!!!not-base64!!!\n```\n";
    let err = parse_container(text).unwrap_err();
    assert!(matches!(err, FormatError::Base64 { .. }));
}

#[test]
fn resource_bindings_round_trip() {
    let mut scene = Scene::new();
    scene.upsert(image("img1", 1, "f1"));

    let mut loaded = EmbeddedResource::new_file(fid("f1"));
    loaded.set_data(ResourceData::new(vec![1, 2, 3, 4], "image/png"));
    loaded.set_dark_variant(true);
    scene.resources_mut().insert(fid("f1"), loaded);

    let mut formula = EmbeddedResource::new_equation(fid("eq1"), "a^2 + b^2 = c^2");
    formula.set_mime(Some("image/svg+xml"));
    scene.resources_mut().insert(fid("eq1"), formula);

    let serialized = generate_container(&scene, &WriteOptions::default()).unwrap();
    let parsed = parse_container(&serialized).unwrap();

    let file = parsed.scene.resources().get("f1").unwrap();
    assert!(file.dark_variant());
    assert_eq!(file.data().unwrap().bytes(), &[1, 2, 3, 4]);
    assert_eq!(file.mime(), Some("image/png"));

    let equation = parsed.scene.resources().get("eq1").unwrap();
    assert!(equation.is_equation());
    assert_eq!(equation.equation(), Some("a^2 + b^2 = c^2"));
    assert!(!equation.is_loaded());
}
