// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use proteus::merge::reconcile;
use proteus::model::{Element, ElementId, ElementKind};
use proteus::Scene;

// Benchmark identity (keep stable):
// - Group names in this file: `merge.reconcile`, `scene.fingerprint`
// - Case IDs (the string after the `/`) must remain stable across refactors so
//   results stay comparable over time (e.g. `disjoint_256`, `overlap_1024`).

fn scene_with(prefix: &str, count: usize, version: u64) -> Scene {
    let mut scene = Scene::new();
    let elements = (0..count)
        .map(|idx| {
            let id = ElementId::new(format!("{prefix}{idx:05}")).expect("element id");
            let mut element = Element::new(id, ElementKind::Shape);
            element.set_version(version);
            element
        })
        .collect();
    scene.set_elements(elements);
    scene
}

fn overlapping_incoming(local: &Scene, bumped_every: usize) -> Scene {
    let mut incoming = local.clone();
    for (idx, element) in incoming.elements_mut().iter_mut().enumerate() {
        if idx % bumped_every == 0 {
            element.bump_version();
        }
    }
    incoming
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge.reconcile");
    let deleted = BTreeSet::new();

    for &count in &[256_usize, 1024] {
        group.throughput(Throughput::Elements(count as u64));

        let local = scene_with("local", count, 3);
        let incoming = scene_with("remote", count, 1);
        group.bench_function(format!("disjoint_{count}"), |b| {
            b.iter_batched(
                || local.clone(),
                |mut scene| {
                    let outcome = reconcile(&mut scene, black_box(&incoming), &deleted);
                    black_box(outcome)
                },
                BatchSize::SmallInput,
            )
        });

        let base = scene_with("shared", count, 3);
        let bumped = overlapping_incoming(&base, 4);
        group.bench_function(format!("overlap_{count}"), |b| {
            b.iter_batched(
                || base.clone(),
                |mut scene| {
                    let outcome = reconcile(&mut scene, black_box(&bumped), &deleted);
                    black_box(outcome)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene.fingerprint");

    for &count in &[256_usize, 4096] {
        group.throughput(Throughput::Elements(count as u64));
        let scene = scene_with("fp", count, 7);
        group.bench_function(format!("sum_{count}"), |b| {
            b.iter(|| black_box(black_box(&scene).fingerprint()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile, bench_fingerprint);
criterion_main!(benches);
