//! # AutoStabilizer Tick Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use stab_lib::{
    auto_stab::{AutoStabilizer, InputData, Params},
    ctrl_mode::Transition,
    fullbody_ik::FullbodyIkSolver,
    limbs::JointParam,
    robot_model::ModelDescription,
};
use util::module::State;

fn balancing_stabilizer() -> (AutoStabilizer, InputData) {
    let params: Params = util::params::parse(
        include_str!("../../params/auto_stabilizer.toml")
    ).unwrap();
    let model = ModelDescription::parse(include_str!("../../params/robot_model.toml"))
        .unwrap()
        .build()
        .unwrap();

    let input = InputData {
        q_ref: Some(model.q().iter().copied().collect()),
        q_act: Some(model.q().iter().copied().collect()),
        ..InputData::default()
    };

    let mut stab = AutoStabilizer::new(params, model).unwrap();
    stab.request_transition(Transition::StartAbc).unwrap();

    // Through the start transition
    let ticks = (stab.params().mode.abc_start_transition_time / stab.params().dt) as usize + 1;
    for _ in 0..ticks {
        stab.proc(&input).unwrap();
    }

    (stab, input)
}

fn tick_benchmark(c: &mut Criterion) {
    let (mut stab, input) = balancing_stabilizer();

    c.bench_function("auto_stab_tick_standing", |b| b.iter(|| stab.proc(&input).unwrap()));

    stab.go_velocity(0.1, 0.0, 0.0).unwrap();
    c.bench_function("auto_stab_tick_walking", |b| b.iter(|| stab.proc(&input).unwrap()));
}

fn ik_benchmark(c: &mut Criterion) {
    let (stab, _) = balancing_stabilizer();

    let solver = FullbodyIkSolver::new(stab.params().fullbody_ik.clone());
    let joint_params = JointParam::from_model(
        stab.gen_robot(), &stab.params().uncontrollable_joints
    );
    let ref_robot = stab.gen_robot().clone();
    let dt = stab.params().dt;

    c.bench_function("fullbody_ik_step", |b| b.iter(|| {
        let mut gen_robot = stab.gen_robot().clone();
        solver.solve(
            &mut gen_robot,
            stab.end_effectors(),
            &ref_robot,
            stab.gait(),
            &joint_params,
            dt
        ).ok();
    }));
}

criterion_group!(benches, tick_benchmark, ik_benchmark);
criterion_main!(benches);
