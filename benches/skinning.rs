use criterion::{criterion_group, criterion_main, Criterion, black_box};

use skinforge::animation::{
    AnimationChannel, AnimationClip, AnimationKeyframe, Animator, PlayMode, Skeleton,
    SkeletonBuilder,
};
use skinforge::io::ByteStream;
use skinforge::mesh::{self, Mesh, MeshBuffer, Vertex, VertexSkin};

use glam::{Mat4, Quat, Vec2, Vec3};

const CHAIN_LENGTH: usize = 32;

fn create_chain_skeleton() -> Skeleton {
    let mut builder = SkeletonBuilder::new().add_root("bone_0", Mat4::IDENTITY);
    for i in 1..CHAIN_LENGTH {
        builder = builder.add_bone(
            &format!("bone_{}", i),
            &format!("bone_{}", i - 1),
            Mat4::from_translation(Vec3::Y),
        );
    }
    builder.build().unwrap()
}

fn create_wave_clip() -> AnimationClip {
    let mut clip = AnimationClip::new("wave", 100.0, 25.0);
    for i in 0..CHAIN_LENGTH {
        let mut channel = AnimationChannel::new(format!("bone_{}", i));
        for k in 0..=10 {
            let t = k as f32 * 10.0;
            let angle = (t * 0.1 + i as f32 * 0.2).sin() * 0.3;
            channel.add_keyframe(AnimationKeyframe::new(t, Vec3::Y, Quat::from_rotation_z(angle)));
        }
        clip.add_channel(channel);
    }
    clip
}

fn create_skinned_mesh(vertex_count: usize) -> Mesh {
    let mut mesh = Mesh::new();
    mesh.set_skeleton(create_chain_skeleton());

    let mut buffer = MeshBuffer::new(0);
    let mut skin = Vec::with_capacity(vertex_count);
    for i in 0..vertex_count {
        let height = i as f32 / vertex_count as f32 * CHAIN_LENGTH as f32;
        buffer.add_vertex(Vertex::new(Vec3::new(0.5, height, 0.0), Vec3::X, Vec2::ZERO));

        let lower = (height as usize).min(CHAIN_LENGTH - 1);
        let upper = (lower + 1).min(CHAIN_LENGTH - 1);
        let frac = height.fract();
        skin.push(VertexSkin::new(
            [lower as u8, upper as u8, 0, 0],
            [1.0 - frac, frac, 0.0, 0.0],
        ));
    }
    for i in (0..vertex_count as u32 - 2).step_by(3) {
        buffer.add_face(i, i + 1, i + 2);
    }
    buffer.set_skin(skin);
    mesh.add_buffer(buffer);
    mesh
}

fn bench_clip_sampling(c: &mut Criterion) {
    let clip = create_wave_clip();

    c.bench_function("clip_sample_32_channels", |b| {
        let mut t = 0.0f32;
        b.iter(|| {
            t = (t + 0.37) % clip.duration;
            for channel in &clip.channels {
                black_box(channel.sample(black_box(t)));
            }
        });
    });
}

fn bench_global_matrices(c: &mut Criterion) {
    let mut skeleton = create_chain_skeleton();

    c.bench_function("skeleton_global_matrices_32", |b| {
        b.iter(|| {
            skeleton.update_global_matrices();
            black_box(skeleton.skin_matrices());
        });
    });
}

fn bench_skinning(c: &mut Criterion, vertex_count: usize) {
    let mut mesh = create_skinned_mesh(vertex_count);

    c.bench_function(&format!("cpu_skinning_{}", vertex_count), |b| {
        b.iter(|| {
            mesh.update_skinning();
            black_box(mesh.buffer(0).map(|buf| buf.render_vertices().len()));
        });
    });
}

fn bench_skinning_1k(c: &mut Criterion) {
    bench_skinning(c, 1_000);
}

fn bench_skinning_10k(c: &mut Criterion) {
    bench_skinning(c, 10_000);
}

fn bench_animator_frame(c: &mut Criterion) {
    let mut mesh = create_skinned_mesh(10_000);
    let mut animator = Animator::new();
    let layer = animator.add_layer("base");
    animator
        .layer_mut(layer)
        .unwrap()
        .add_clip("wave", create_wave_clip(), &mesh.skeleton)
        .unwrap();
    animator.play_on_layer(layer, "wave", PlayMode::Loop, 0.0).unwrap();

    c.bench_function("animator_frame_10k", |b| {
        b.iter(|| {
            animator.update_mesh(black_box(1.0 / 60.0), &mut mesh);
        });
    });
}

fn bench_mesh_write(c: &mut Criterion) {
    let mesh = create_skinned_mesh(10_000);

    c.bench_function("mesh_write_10k", |b| {
        b.iter(|| {
            let mut stream = ByteStream::memory();
            mesh::write_mesh(&mut stream, black_box(&mesh)).unwrap();
            black_box(stream.into_bytes())
        });
    });
}

criterion_group!(
    benches,
    bench_clip_sampling,
    bench_global_matrices,
    bench_skinning_1k,
    bench_skinning_10k,
    bench_animator_frame,
    bench_mesh_write,
);
criterion_main!(benches);
