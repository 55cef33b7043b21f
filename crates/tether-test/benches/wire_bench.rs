//! Benchmarks for sync frame encoding

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tether_core::{Anchor, ObjectId, PeerId, Quat, Vec3};
use tether_wire::{FieldMask, FieldValues, FrameKind, SyncFrame, SyncHeader};

fn full_frame() -> SyncFrame {
    let mut header = SyncHeader::new(FrameKind::Forced, ObjectId::new(77), PeerId::new(3), 1024);
    header.mask = FieldMask::all();
    SyncFrame::new(
        header,
        FieldValues {
            holder: Some(PeerId::new(3)),
            anchor: Anchor::Left,
            offset_rotation: Quat::from_euler(0.3, 0.1, -0.2),
            offset_position: Vec3::new(0.05, -0.02, 0.1),
            frozen: false,
            position: Vec3::new(4.0, 1.2, -3.5),
            rotation: Quat::from_euler(1.0, 0.0, 0.0),
            linear_velocity: Vec3::new(0.0, -2.0, 1.0),
            angular_velocity: Vec3::new(0.5, 0.0, 0.0),
        },
    )
}

fn physics_delta() -> SyncFrame {
    let mut header = SyncHeader::new(FrameKind::Delta, ObjectId::new(77), PeerId::new(3), 1025);
    header.mask = FieldMask::new(FieldMask::POSITION | FieldMask::LINEAR_VELOCITY);
    SyncFrame::new(
        header,
        FieldValues {
            position: Vec3::new(4.0, 1.1, -3.4),
            linear_velocity: Vec3::new(0.0, -2.2, 1.0),
            ..FieldValues::default()
        },
    )
}

fn bench_encode_full(c: &mut Criterion) {
    let frame = full_frame();
    c.bench_function("encode_full", |b| b.iter(|| black_box(&frame).encode()));
}

fn bench_decode_full(c: &mut Criterion) {
    let bytes = full_frame().encode();
    c.bench_function("decode_full", |b| {
        b.iter(|| SyncFrame::decode(black_box(&bytes)).unwrap())
    });
}

fn bench_decode_delta(c: &mut Criterion) {
    let bytes = physics_delta().encode();
    c.bench_function("decode_physics_delta", |b| {
        b.iter(|| SyncFrame::decode(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_encode_full, bench_decode_full, bench_decode_delta);
criterion_main!(benches);
