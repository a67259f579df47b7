mod support;

use std::path::{Path, PathBuf};

use soundromeda::config::LayoutConfig;
use soundromeda::layout::{GalaxyMeta, UmapParams};
use soundromeda::{
    BuiltinRequest, ExtractorConfig, FeatureExtractor, LayoutError, LayoutOptions, PlacementModel,
    ProjectError, build_builtin_library, fit_corpus, project_sample,
};
use support::wav::write_tone;
use tempfile::tempdir;

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(ExtractorConfig::default()).expect("default extractor")
}

fn options(n_components: usize) -> LayoutOptions {
    LayoutOptions {
        umap: UmapParams {
            n_components,
            ..UmapParams::default()
        },
        worker_count: Some(2),
    }
}

fn three_tones(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_tone(dir, "low.wav", 220.0, 0.5, 1.0),
        write_tone(dir, "mid.wav", 880.0, 0.5, 1.0),
        write_tone(dir, "high.wav", 3_520.0, 0.5, 1.0),
    ]
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[test]
fn near_duplicate_projects_next_to_its_original() {
    let dir = tempdir().unwrap();
    let files = three_tones(dir.path());
    let model_path = dir.path().join("meta").join("umap_model.json");

    let layout = fit_corpus(&files, &extractor(), &options(2), Some(model_path.as_path())).unwrap();
    assert_eq!(layout.coords.dim(), (3, 2));
    assert_eq!(layout.sources, files);
    assert!(layout.skipped.is_empty());
    for column in layout.coords.columns() {
        assert!(column.sum().abs() / 3.0 < 1e-4, "layout is not centered");
    }
    assert!(model_path.is_file());

    let duplicate = write_tone(dir.path(), "low_again.wav", 220.0, 0.45, 1.0);
    let model = PlacementModel::load(&model_path).unwrap();
    let projected = model.project(&duplicate).unwrap();
    assert_eq!(projected.len(), 2);

    let coords: Vec<Vec<f32>> = layout.coords.rows().into_iter().map(|r| r.to_vec()).collect();
    let to_low = distance(&projected, &coords[0]);
    assert!(to_low < distance(&projected, &coords[1]), "{projected:?} vs {coords:?}");
    assert!(to_low < distance(&projected, &coords[2]), "{projected:?} vs {coords:?}");
}

#[test]
fn persisted_model_reproduces_in_memory_transform() {
    let dir = tempdir().unwrap();
    let files = three_tones(dir.path());
    let model_path = dir.path().join("model.json");
    let layout = fit_corpus(&files, &extractor(), &options(3), Some(model_path.as_path())).unwrap();
    let in_memory = layout.model.expect("fitted model");
    let loaded = PlacementModel::load(&model_path).unwrap();

    let probe = write_tone(dir.path(), "probe.wav", 1_000.0, 0.3, 0.7);
    let before = in_memory.project(&probe).unwrap();
    let after = loaded.project(&probe).unwrap();
    assert_eq!(before.len(), 3);
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-5, "{before:?} != {after:?}");
    }
    assert_eq!(loaded.centroid(), in_memory.centroid());
}

#[test]
fn failed_inputs_are_skipped_in_order() {
    let dir = tempdir().unwrap();
    let tones = three_tones(dir.path());
    let garbage = dir.path().join("garbage.wav");
    std::fs::write(&garbage, b"definitely not audio").unwrap();
    let missing = dir.path().join("missing.mp3");
    let files = vec![
        tones[0].clone(),
        garbage.clone(),
        tones[1].clone(),
        missing.clone(),
        tones[2].clone(),
    ];

    let layout = fit_corpus(&files, &extractor(), &options(2), None).unwrap();
    assert_eq!(layout.sources, tones);
    assert_eq!(layout.coords.nrows(), 3);
    let skipped: Vec<&Path> = layout.skipped.iter().map(|s| s.path.as_path()).collect();
    assert_eq!(skipped, vec![garbage.as_path(), missing.as_path()]);
    assert!(layout.skipped.iter().all(|s| !s.reason.is_empty()));
}

#[test]
fn single_survivor_sits_at_origin_without_model() {
    let dir = tempdir().unwrap();
    let only = write_tone(dir.path(), "only.wav", 440.0, 0.5, 0.5);
    let model_path = dir.path().join("model.json");

    let layout = fit_corpus(&[only], &extractor(), &options(3), Some(model_path.as_path())).unwrap();
    assert_eq!(layout.coords.dim(), (1, 3));
    assert!(layout.coords.iter().all(|v| *v == 0.0));
    assert!(layout.model.is_none());
    assert!(layout.removed_model.is_none());
    assert!(!model_path.exists());
}

#[test]
fn single_survivor_rebuild_retires_previous_model() {
    let dir = tempdir().unwrap();
    let files = three_tones(dir.path());
    let meta_path = dir.path().join("builtin.json");
    let model_path = dir.path().join("umap_model.json");
    let mut request = BuiltinRequest {
        files,
        meta_path: meta_path.clone(),
        model_path: Some(model_path.clone()),
        base_audio_path: String::new(),
        audio_root: None,
    };
    let first = build_builtin_library(&request, &extractor(), &options(3)).unwrap();
    assert_eq!(first.model_path.as_deref(), Some(model_path.as_path()));
    assert_eq!(first.removed_model, None);

    let garbage = dir.path().join("broken.wav");
    std::fs::write(&garbage, b"nope").unwrap();
    request.files = vec![request.files[0].clone(), garbage];
    let second = build_builtin_library(&request, &extractor(), &options(3)).unwrap();
    assert_eq!(second.points, 1);
    assert_eq!(second.model_path, None);
    assert_eq!(second.removed_model.as_deref(), Some(model_path.as_path()));
    assert!(!model_path.exists());

    let meta = GalaxyMeta::load(&meta_path).unwrap();
    assert_eq!(meta.points[0].coords_3d, [0.0, 0.0, 0.0]);
    let mut config = LayoutConfig::default();
    config.paths.model = model_path;
    assert!(matches!(
        project_sample(&request.files[0], None, &config),
        Err(ProjectError::NoModel { .. })
    ));
}

#[test]
fn neighborhood_below_two_is_raised_instead_of_rejected() {
    let dir = tempdir().unwrap();
    let files = three_tones(dir.path());
    let mut tiny = options(2);
    tiny.umap.n_neighbors = 1;
    let layout = fit_corpus(&files, &extractor(), &tiny, None).unwrap();
    assert_eq!(layout.coords.dim(), (3, 2));
    assert!(layout.coords.iter().all(|v| v.is_finite()));
    let model = layout.model.expect("fitted model");
    assert_eq!(model.reducer().params().n_neighbors, 1);
}

#[test]
fn empty_corpus_yields_empty_layout() {
    let layout = fit_corpus(&[], &extractor(), &options(2), None).unwrap();
    assert_eq!(layout.coords.dim(), (0, 2));
    assert!(layout.sources.is_empty());
}

#[test]
fn unsupported_dimensionality_fails_before_reading_audio() {
    let files = vec![PathBuf::from("/nowhere/a.wav"), PathBuf::from("/nowhere/b.wav")];
    for n_components in [1, 4] {
        match fit_corpus(&files, &extractor(), &options(n_components), None) {
            Err(LayoutError::InvalidComponents(found)) => assert_eq!(found, n_components),
            other => panic!("expected InvalidComponents, got {other:?}"),
        }
    }
}

#[test]
fn project_sample_distinguishes_missing_model() {
    let dir = tempdir().unwrap();
    let sample = write_tone(dir.path(), "upload.wav", 330.0, 0.5, 0.5);
    let mut config = LayoutConfig::default();
    config.paths.model = dir.path().join("absent.json");

    let err = project_sample(&sample, None, &config).unwrap_err();
    assert!(matches!(err, ProjectError::NoModel { ref path } if *path == config.paths.model));
    assert!(err.is_operational());

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, b"{ not json").unwrap();
    let err = project_sample(&sample, Some(corrupt.as_path()), &config).unwrap_err();
    assert!(matches!(
        err,
        ProjectError::TransformFailed {
            source: LayoutError::ModelCorrupt { .. },
            ..
        }
    ));
}

#[test]
fn project_sample_uses_configured_model_path() {
    let dir = tempdir().unwrap();
    let files = three_tones(dir.path());
    let mut config = LayoutConfig::default();
    config.paths.model = dir.path().join("static").join("umap_model.json");
    fit_corpus(&files, &extractor(), &options(2), Some(config.paths.model.as_path())).unwrap();

    let coords = project_sample(&files[1], None, &config).unwrap();
    assert_eq!(coords.len(), 2);
    assert!(coords.iter().all(|v| v.is_finite()));

    let bad = dir.path().join("bad.wav");
    std::fs::write(&bad, b"RIFF").unwrap();
    let err = project_sample(&bad, None, &config).unwrap_err();
    assert!(matches!(
        err,
        ProjectError::TransformFailed {
            source: LayoutError::Extraction { .. },
            ..
        }
    ));
    assert!(!err.is_operational());
}

#[test]
fn builtin_library_writes_galaxy_metadata() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("library");
    let kits = root.join("kits");
    std::fs::create_dir_all(&kits).unwrap();
    let files = vec![
        write_tone(&kits, "kick.wav", 110.0, 0.6, 0.6),
        write_tone(&root, "pad.wav", 660.0, 0.4, 1.2),
        write_tone(&root, "hat.wav", 5_000.0, 0.3, 0.3),
    ];
    let meta_path = dir.path().join("static").join("meta").join("builtin.json");
    let model_path = dir.path().join("static").join("meta").join("umap_model.json");
    let request = BuiltinRequest {
        files,
        meta_path: meta_path.clone(),
        model_path: Some(model_path.clone()),
        base_audio_path: "audio/".to_string(),
        audio_root: Some(root),
    };

    let summary = build_builtin_library(&request, &extractor(), &options(2)).unwrap();
    assert_eq!(summary.points, 3);
    assert_eq!(summary.model_path.as_deref(), Some(model_path.as_path()));
    assert_eq!(PlacementModel::load(&model_path).unwrap().n_components(), 3);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
    let first = &raw["points"][0];
    for key in ["id", "coords_2d", "coords_3d", "name", "audio_path"] {
        assert!(first.get(key).is_some(), "missing {key}");
    }

    let meta = GalaxyMeta::load(&meta_path).unwrap();
    let ids: Vec<&str> = meta.points.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["builtin-0", "builtin-1", "builtin-2"]);
    let paths: Vec<&str> = meta.points.iter().map(|p| p.audio_path.as_str()).collect();
    assert_eq!(paths, vec!["audio/kits/kick.wav", "audio/pad.wav", "audio/hat.wav"]);
    assert_eq!(meta.points[0].name, "kick");
    for point in &meta.points {
        assert_eq!(point.coords_2d, [point.coords_3d[0], point.coords_3d[1]]);
    }
}
