//! 规划演示 - 参考机械臂绕过一个长方体障碍物
//!
//! # 运行
//!
//! ```bash
//! RUST_LOG=motiongen=debug cargo run -p motiongen --example plan_to_pose
//! ```

use motiongen::prelude::*;
use motiongen::types::Vector3;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    motiongen::init_logger();

    println!("MotionGen - plan to pose demo");
    println!("=============================\n");

    // 1. 构造规划器（参考机械臂 + 一个障碍物）
    let world = WorldModel::empty().with_cuboid(Cuboid::new(
        "table_post",
        [0.08, 0.08, 0.3],
        Pose::from_translation(0.55, 0.25, 0.35),
    ));
    let mut motion_gen = MotionGen::builder()
        .config(MotionGenConfig {
            num_ik_seeds: 16,
            ..Default::default()
        })
        .reference_robot(SerialChain::demo_arm())
        .world(world)
        .build()?;

    // 2. 预热
    let warmup = motion_gen.warmup(false)?;
    println!("warm-up: {} in {:?}", warmup.status, warmup.timings.total_time);

    // 3. 规划
    let start = motion_gen.retract_state();
    let goal = motion_gen
        .kinematics()
        .forward(&start.position)?
        .translated(Vector3::new(-0.1, 0.35, 0.05));
    let plan = PlanConfig {
        max_attempts: 4,
        enable_graph: true,
        enable_graph_attempt: Some(1),
        ..Default::default()
    };
    let result = motion_gen.plan_single(&start, &goal, &plan);

    // 4. 结果
    println!("status:   {}", result.status);
    println!("attempts: {}", result.attempts);
    for record in &result.debug {
        println!(
            "  #{} {:?}: {} (ik {:?}, trajopt {:?})",
            record.index, record.strategy, record.status, record.ik_time, record.trajopt_time
        );
    }
    if let Some(plan) = result.get_interpolated_plan() {
        println!(
            "motion time {:.3} s, {} waypoints at {} s, position error {:.2} mm",
            result.motion_time.unwrap_or_default(),
            plan.len(),
            result.interpolation_dt,
            result.position_error.unwrap_or_default() * 1000.0
        );
    }
    Ok(())
}
