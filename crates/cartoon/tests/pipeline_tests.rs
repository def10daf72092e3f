mod common;

use {
    base::Vec2,
    candle_core::{Device, Tensor},
    cartoon::{
        BufferLedger, BufferRole, FramePipeline, InvocationErrorKind, Stage, Telemetry,
        pipeline::resize_bilinear,
    },
    common::*,
    image::{Image, PixelFormat},
    std::sync::{Arc, Mutex},
};

fn values_of(tensor: &Tensor) -> Vec<f32> {
    tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap()
}

#[test]
fn test_zero_frame_normalizes_to_minus_half() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 256, 256), Telemetry::global())
        .with_inspector(move |role, tensor| {
            if role == BufferRole::Scaled || role == BufferRole::Centered {
                recorder.lock().unwrap().push((role, values_of(tensor)));
            }
        });
    let mut surface = RecordingSurface::default();

    pipeline
        .process_frame(&solid(256, 256, 0), &mut surface)
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let (role, scaled) = &seen[0];
    assert_eq!(*role, BufferRole::Scaled);
    assert!(scaled.iter().all(|&v| v == 0.0));
    let (role, centered) = &seen[1];
    assert_eq!(*role, BufferRole::Centered);
    assert_eq!(centered.len(), 256 * 256 * 3);
    assert!(centered.iter().all(|&v| v == -0.5));
}

#[test]
fn test_output_clipped_at_both_ends() {
    let mut pipeline = FramePipeline::new(warmed(RangeNetwork, 16, 16), Telemetry::global());
    let mut surface = RecordingSurface::default();

    pipeline
        .process_frame(&solid(16, 16, 128), &mut surface)
        .unwrap();

    assert_eq!(surface.dims, vec![vec![16, 16, 3]]);
    let frame = &surface.frames[0];
    assert!(frame.iter().all(|&v| (0.0..=1.0).contains(&v)));
    // -1 + 1 = 0 and 3 + 1 = 4 -> 1
    assert!(frame.iter().any(|&v| v == 0.0));
    assert!(frame.iter().any(|&v| v == 1.0));
    let min = frame.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = frame.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    assert_eq!((min, max), (0.0, 1.0));
}

#[test]
fn test_identity_model_output() {
    // white: 1.0 - 0.5 + 1.0 = 1.5 -> 1, black: -0.5 + 1.0 = 0.5
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 8, 8), Telemetry::global());
    let mut surface = RecordingSurface::default();
    pipeline
        .process_frame(&solid(8, 8, 255), &mut surface)
        .unwrap();
    pipeline
        .process_frame(&solid(8, 8, 0), &mut surface)
        .unwrap();
    assert!(surface.frames[0].iter().all(|&v| v == 1.0));
    assert!(surface.frames[1].iter().all(|&v| v == 0.5));
}

#[test]
fn test_every_role_produced_in_order() {
    let roles = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&roles);
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 32, 24), Telemetry::global())
        .with_inspector(move |role, tensor| {
            recorder.lock().unwrap().push((role, tensor.dims().to_vec()));
        });
    let mut surface = RecordingSurface::default();

    pipeline
        .process_frame(&solid(64, 48, 10), &mut surface)
        .unwrap();

    let roles = roles.lock().unwrap();
    let order: Vec<BufferRole> = roles.iter().map(|(role, _)| *role).collect();
    assert_eq!(order, BufferRole::ALL.to_vec());
    assert_eq!(roles[0].1, vec![48, 64, 3]);
    assert_eq!(roles[1].1, vec![24, 32, 3]);
    assert_eq!(roles[5].1, vec![1, 24, 32, 3]);
    assert_eq!(roles[10].1, vec![24, 32, 3]);
}

#[test]
fn test_ledger_balanced_across_invocations() {
    let ledger = BufferLedger::new();
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 16, 16), Telemetry::global())
        .with_ledger(ledger.clone());
    let mut surface = RecordingSurface::default();

    for i in 0..25 {
        pipeline
            .process_frame(&solid(20, 10, i as u8), &mut surface)
            .unwrap();
        assert_eq!(ledger.live(), 0);
    }
    assert_eq!(ledger.allocated(), 25 * BufferRole::ALL.len() as u64);
    assert_eq!(ledger.released(), ledger.allocated());
    assert!(ledger.peak() <= BufferRole::ALL.len());
    assert_eq!(pipeline.invocations(), 25);
}

#[test]
fn test_ledger_balanced_on_failures() {
    let ledger = BufferLedger::new();

    // failing model
    let mut pipeline = FramePipeline::new(warmed(FailingNetwork::after(1), 8, 8), Telemetry::global())
        .with_ledger(ledger.clone());
    let mut surface = RecordingSurface::default();
    for _ in 0..5 {
        let error = pipeline
            .process_frame(&solid(8, 8, 1), &mut surface)
            .unwrap_err();
        assert_eq!(error.stage, Stage::Infer);
        assert!(matches!(error.kind, InvocationErrorKind::Backend(_)));
        assert_eq!(ledger.live(), 0);
    }
    assert!(surface.frames.is_empty());

    // bad shape out of the model
    let mut pipeline = FramePipeline::new(warmed(SqueezingNetwork::new(), 8, 8), Telemetry::global())
        .with_ledger(ledger.clone());
    let error = pipeline
        .process_frame(&solid(8, 8, 1), &mut surface)
        .unwrap_err();
    assert_eq!(error.stage, Stage::Infer);
    assert!(matches!(error.kind, InvocationErrorKind::Shape(_)));
    assert_eq!(ledger.live(), 0);

    // failing surface
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 8, 8), Telemetry::global())
        .with_ledger(ledger.clone());
    let mut failing = RecordingSurface::failing();
    let error = pipeline
        .process_frame(&solid(8, 8, 1), &mut failing)
        .unwrap_err();
    assert_eq!(error.stage, Stage::Render);
    assert!(matches!(error.kind, InvocationErrorKind::Render(_)));
    assert_eq!(ledger.live(), 0);

    assert_eq!(ledger.allocated(), ledger.released());
    assert!(ledger.peak() <= BufferRole::ALL.len());
}

#[test]
fn test_rejects_bad_frames() {
    let ledger = BufferLedger::new();
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 8, 8), Telemetry::global())
        .with_ledger(ledger.clone());
    let mut surface = RecordingSurface::default();

    let yuyv = Image::new(Vec2::new(4, 4), vec![0; 32], PixelFormat::Yuyv);
    let empty = Image::new(Vec2::new(0, 4), vec![], PixelFormat::Rgb8);
    let short = Image::new(Vec2::new(4, 4), vec![0; 10], PixelFormat::Rgb8);
    for frame in [yuyv, empty, short] {
        let error = pipeline.process_frame(&frame, &mut surface).unwrap_err();
        assert_eq!(error.stage, Stage::Capture);
        assert!(matches!(error.kind, InvocationErrorKind::Shape(_)));
    }
    assert_eq!(ledger.allocated(), 0);
    assert!(surface.frames.is_empty());
}

#[test]
fn test_predict_logged_per_inference() {
    let logger = RecordingLogger::new();
    let mut pipeline = FramePipeline::new(warmed(FailingNetwork::after(3), 8, 8), telemetry(&logger));
    let mut surface = RecordingSurface::default();

    for _ in 0..4 {
        let _ = pipeline.process_frame(&solid(8, 8, 0), &mut surface);
    }
    // warmup used one pass, two frames succeeded, two failed
    assert_eq!(logger.count("predict: "), 2);
    assert_eq!(surface.frames.len(), 2);
}

#[test]
fn test_debug_shapes_logs_each_stage() {
    let logger = RecordingLogger::new();
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 8, 8), telemetry(&logger))
        .with_debug_shapes(true);
    let mut surface = RecordingSurface::default();
    pipeline
        .process_frame(&solid(8, 8, 0), &mut surface)
        .unwrap();

    let messages = logger.messages();
    for role in BufferRole::ALL {
        assert!(
            messages.iter().any(|m| m.starts_with(&format!("{}: ", role))),
            "missing {} in {:?}",
            role,
            messages
        );
    }
    assert!(messages.contains(&"batched: [1, 8, 8, 3]".to_string()));
}

#[test]
fn test_debug_shapes_off_by_default() {
    let logger = RecordingLogger::new();
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 8, 8), telemetry(&logger));
    let mut surface = RecordingSurface::default();
    pipeline
        .process_frame(&solid(8, 8, 0), &mut surface)
        .unwrap();
    assert_eq!(logger.messages().len(), 1);
    assert_eq!(logger.count("predict: "), 1);
}

#[test]
fn test_resize_bilinear_upscale() {
    let image = Tensor::from_vec(vec![0f32, 10.0, 20.0, 30.0], (2, 2, 1), &Device::Cpu).unwrap();
    let resized = resize_bilinear(&image, 4, 4).unwrap();
    assert_eq!(resized.dims(), &[4, 4, 1]);
    assert_eq!(
        values_of(&resized),
        vec![
            0.0, 5.0, 10.0, 10.0, //
            10.0, 15.0, 20.0, 20.0, //
            20.0, 25.0, 30.0, 30.0, //
            20.0, 25.0, 30.0, 30.0,
        ]
    );
}

#[test]
fn test_resize_bilinear_downscale_samples_top_left() {
    let data: Vec<u8> = (0..16).collect();
    let image = Tensor::from_vec(data, (4, 4, 1), &Device::Cpu).unwrap();
    let resized = resize_bilinear(&image, 2, 2).unwrap();
    assert_eq!(values_of(&resized), vec![0.0, 2.0, 8.0, 10.0]);
}

#[test]
fn test_resize_bilinear_keeps_channels_apart() {
    let image = Tensor::from_vec(
        vec![0f32, 100.0, 200.0, 10.0, 110.0, 210.0],
        (1, 2, 3),
        &Device::Cpu,
    )
    .unwrap();
    let resized = resize_bilinear(&image, 1, 4).unwrap();
    assert_eq!(
        values_of(&resized),
        vec![
            0.0, 100.0, 200.0, //
            5.0, 105.0, 205.0, //
            10.0, 110.0, 210.0, //
            10.0, 110.0, 210.0,
        ]
    );
}

#[test]
fn test_resize_bilinear_same_size_casts_only() {
    let image = Tensor::from_vec(vec![7u8; 12], (2, 2, 3), &Device::Cpu).unwrap();
    let resized = resize_bilinear(&image, 2, 2).unwrap();
    assert_eq!(resized.dtype(), candle_core::DType::F32);
    assert!(values_of(&resized).iter().all(|&v| v == 7.0));
}

#[test]
fn test_scale_is_true_division() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let mut pipeline = FramePipeline::new(warmed(IdentityNetwork, 16, 16), Telemetry::global())
        .with_inspector(move |role, tensor| {
            if role == BufferRole::Scaled {
                recorder.lock().unwrap().extend(values_of(tensor));
            }
        });
    let data: Vec<u8> = (0..16 * 16 * 3).map(|i| (i % 256) as u8).collect();
    let frame = Image::rgb8(Vec2::new(16, 16), data.clone()).unwrap();
    let mut surface = RecordingSurface::default();

    pipeline.process_frame(&frame, &mut surface).unwrap();

    let scaled = seen.lock().unwrap();
    assert_eq!(scaled.len(), data.len());
    for (value, byte) in scaled.iter().zip(data) {
        assert_eq!(*value, byte as f32 / 255.0);
    }
}
