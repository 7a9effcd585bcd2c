use std::time::Instant;

use fluid::frame::{FrameLoop, FrameStatus};
use fluid::{
    FluidConfig, FluidSimulation, FrameOutcome, PointerEvent, SoftwareBackend, TimeStep,
    MOUSE_POINTER,
};

fn ignition_config() -> FluidConfig {
    FluidConfig {
        sim_resolution: 128,
        dye_resolution: 512,
        ignition_splats: Some(5),
        time_step: TimeStep::Fixed { dt: 1.0 / 60.0 },
        ..FluidConfig::default()
    }
}

#[test]
fn ignition_dye_decays_without_input() {
    let mut sim = FluidSimulation::with_seed(SoftwareBackend::new(512, 512), ignition_config(), 42);
    let mut frame_loop = FrameLoop::new(TimeStep::Fixed { dt: 1.0 / 60.0 });
    frame_loop.start(&mut sim).unwrap();

    // Baseline: the ignition burst alone, before any step runs.
    sim.apply_inputs().unwrap();
    assert_eq!(sim.pending_bursts(), 0);
    let splatted = sim.dye_energy().unwrap();
    assert!(splatted.is_finite() && splatted > 0.0, "energy {splatted}");

    let mut energies = Vec::new();
    for _ in 0..60 {
        let status = frame_loop.tick(&mut sim, Instant::now()).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        energies.push(sim.dye_energy().unwrap());
    }

    for energy in &energies {
        assert!(energy.is_finite() && *energy > 0.0, "energy {energy}");
    }
    let middle = energies[29];
    let last = energies[59];
    assert!(middle < splatted, "{middle} >= {splatted}");
    assert!(last < middle, "{last} >= {middle}");
    assert!(last < splatted * 0.5, "dye barely decayed: {splatted} -> {last}");

    let lit = sim.backend().frame().iter().filter(|texel| texel[3] > 0.0).count();
    assert!(lit > 0, "composited frame is empty");
}

#[test]
fn pointer_drag_adds_dye_to_a_blank_canvas() {
    let config = FluidConfig {
        sim_resolution: 32,
        dye_resolution: 64,
        ignition_splats: Some(0),
        ..FluidConfig::default()
    };
    let mut sim = FluidSimulation::with_seed(SoftwareBackend::new(128, 128), config, 8);
    sim.initialize().unwrap();
    assert_eq!(sim.frame(1.0 / 60.0).unwrap(), FrameOutcome::Presented);
    assert_eq!(sim.dye_energy().unwrap(), 0.0);

    sim.handle_pointer(PointerEvent::Pressed { id: MOUSE_POINTER, x: 40.0, y: 64.0 });
    sim.handle_pointer(PointerEvent::Moved { id: MOUSE_POINTER, x: 60.0, y: 64.0 });
    sim.frame(1.0 / 60.0).unwrap();

    assert!(sim.dye_energy().unwrap() > 0.0);
}

#[test]
fn opaque_mode_composites_over_the_back_colour() {
    let config = FluidConfig {
        sim_resolution: 8,
        dye_resolution: 8,
        transparent: false,
        back_color: fluid::Color::new(0.2, 0.4, 0.6),
        ignition_splats: Some(0),
        ..FluidConfig::default()
    };
    let mut sim = FluidSimulation::with_seed(SoftwareBackend::new(16, 16), config, 2);
    sim.initialize().unwrap();
    sim.frame(1.0 / 60.0).unwrap();

    for texel in sim.backend().frame() {
        assert!((texel[0] - 0.2).abs() < 1e-6);
        assert!((texel[1] - 0.4).abs() < 1e-6);
        assert!((texel[2] - 0.6).abs() < 1e-6);
        assert!((texel[3] - 1.0).abs() < 1e-6);
    }
}
