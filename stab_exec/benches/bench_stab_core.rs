//! # Stabiliser Core Benchmark

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use comms_if::eqpt::imu::ImuSample;
use nalgebra::{Rotation3, Vector3};
use stab_lib::{
    drift_ctrl::{DriftCtrl, InputData, Params},
    imu_sync::extract_up_to,
    sensor_queue::SensorQueue,
    tracker::Pose,
};
use util::module::State;

fn imu_sync_benchmark(c: &mut Criterion) {
    // A 200 Hz IMU against a 20 Hz camera gives 10 samples per frame
    c.bench_function("extract_up_to 10 of 1000", |b| {
        b.iter_batched(
            || {
                let queue = SensorQueue::new("imu");
                for i in 0..1000 {
                    queue.push(ImuSample::new(
                        i as f64 * 0.005,
                        Vector3::new(0.0, 0.0, 9.81),
                        Vector3::zeros(),
                    ));
                }
                queue
            },
            |queue| extract_up_to(&queue, black_box(0.0475)),
            BatchSize::SmallInput,
        )
    });
}

fn drift_ctrl_benchmark(c: &mut Criterion) {
    let mut drift_ctrl = DriftCtrl::new(Params::default());

    let input = InputData {
        pose: Pose::new(
            Vector3::new(0.12, -0.05, 1.03),
            Rotation3::from_euler_angles(0.02, -0.01, 0.15),
        ),
        reference: Pose::new(Vector3::new(0.0, 0.0, 1.0), Rotation3::identity()),
        movement_gain: 5.0,
        rotation_gain: 0.25,
    };

    c.bench_function("drift_ctrl proc", |b| {
        b.iter(|| drift_ctrl.proc(black_box(&input)))
    });
}

criterion_group!(benches, imu_sync_benchmark, drift_ctrl_benchmark);
criterion_main!(benches);
