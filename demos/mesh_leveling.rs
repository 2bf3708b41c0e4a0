use ubl_mesh::{algorithms::fill::FillDirection, errors::LevelingError, storage::slots::MeshSlots, BoundingBox, LevelingConfig, UnifiedBedLeveling};

/// A slightly warped bed: tilted, with a bump in the middle.
fn bed(x: f32, y: f32) -> f32
{
    let (dx, dy) = (x - 110.0, y - 110.0);
    0.0008 * x - 0.0005 * y + 0.08 * (-(dx * dx + dy * dy) / 2000.0).exp()
}

fn probe_partial_mesh() -> Result<UnifiedBedLeveling<5, 5>, LevelingError>
{
    println!("\nRunning \"probe_partial_mesh\" example\n");
    // the probe is offset from the nozzle and cannot reach the front edge
    let config = LevelingConfig { probe_bounds: BoundingBox::new([10.0, 40.0], [210.0, 210.0]), ..LevelingConfig::default() };
    let mut ubl = UnifiedBedLeveling::<5, 5>::new(config)?;

    let mut probe = |x: f32, y: f32| Some(bed(x, y));
    let probed = ubl.probe_entire_mesh(&mut probe, [110.0, 110.0], true, None)?;
    println!("probed {probed} points");
    println!("{}", ubl.mesh());

    let filled = ubl.smart_fill_mesh();
    println!("smart fill added {filled} points, mesh valid: {}", ubl.mesh_is_valid());
    if !ubl.mesh_is_valid()
    {
        ubl.smart_fill_wlsf(1.0)?;
    }
    println!("{}", ubl.mesh());
    Ok(ubl)
}

fn correct_moves(ubl: &mut UnifiedBedLeveling<5, 5>) -> Result<(), LevelingError>
{
    println!("\nRunning \"correct_moves\" example\n");
    ubl.enable()?;
    for (x, y) in [(10.0, 10.0), (60.0, 110.0), (110.0, 110.0), (205.0, 30.0)]
    {
        let z = ubl.z_correction(x, y);
        println!("x={x}, y={y}, correction {z:.4}, actual {:.4}, error={:.5}", bed(x, y), (z - bed(x, y)).abs());
    }
    for p in ubl.plan_line([20.0, 20.0, 0.2], [190.0, 150.0, 0.2])
    {
        println!("  G1 X{:.3} Y{:.3} Z{:.4}", p[0], p[1], p[2]);
    }
    Ok(())
}

fn save_and_restore(ubl: &mut UnifiedBedLeveling<5, 5>) -> Result<(), LevelingError>
{
    println!("\nRunning \"save_and_restore\" example\n");
    let mut slots = MeshSlots::new(4);
    ubl.store_to_slot(&mut slots, 0)?;
    ubl.reset();
    ubl.set_all_points_to_value(0.0);
    ubl.set_z(2, 2, f32::NAN)?;
    println!("center refilled: {}", ubl.smart_fill_one(2, 2, FillDirection::Right));
    ubl.load_from_slot(&slots, 0)?;
    let stats = ubl.adjust_mesh_to_mean(0.0);
    println!("restored slot {:?}, statistics before centering: {stats:?}", ubl.storage_slot());
    Ok(())
}

fn main() -> Result<(), LevelingError>
{
    let mut ubl = probe_partial_mesh()?;
    correct_moves(&mut ubl)?;
    save_and_restore(&mut ubl)?;
    Ok(())
}
