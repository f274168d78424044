use crate::{
    body::Body,
    collisions::CollisionRecord,
    config::SimulationConfig,
    forces::{ChainParams, ForceLaw, GravityParams, SpringParams},
    integrator::IntegrationOrder,
    simulation::Simulation,
};

/// Flat collision entry handed across the C boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionInfo {
    pub body_index: usize,
    /// First target hit, or -1 when the record names none.
    pub target_index: isize,
    pub collision_time: f64,
}

impl From<&CollisionRecord> for CollisionInfo {
    fn from(record: &CollisionRecord) -> Self {
        Self {
            body_index: record.body_index,
            target_index: record.first_target().map_or(-1, |t| t as isize),
            collision_time: record.collision_time,
        }
    }
}

/// Opaque handle owned by the C caller.
pub struct SimulationHandle {
    sim: Simulation,
    /// Collisions from the most recent advance.
    collisions: Vec<CollisionInfo>,
}

fn force_law_for(kind: u32) -> Option<ForceLaw> {
    match kind {
        0 => Some(ForceLaw::Gravity(GravityParams::default())),
        1 => Some(ForceLaw::Spring(SpringParams::default())),
        2 => Some(ForceLaw::Chain(ChainParams::default())),
        _ => None,
    }
}

/// Creates a simulation. `kind` selects gravity (0), spring (1) or chain (2); `workers`
/// of zero uses one per core. Returns null on invalid arguments.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Create(dt: f64, kind: u32, order: u32, workers: usize) -> *mut SimulationHandle {
    let Some(force_law) = force_law_for(kind) else {
        log::error!("Simulation_Create: unknown force law kind {kind}");
        return std::ptr::null_mut();
    };
    let Some(Ok(order)) = u8::try_from(order).ok().map(IntegrationOrder::try_from) else {
        log::error!("Simulation_Create: unsupported integration order {order}");
        return std::ptr::null_mut();
    };

    let mut config = SimulationConfig::new(dt, force_law).with_order(order);
    if workers > 0 {
        config = config.with_workers(workers);
    }
    match Simulation::new(config) {
        Ok(sim) => Box::into_raw(Box::new(SimulationHandle {
            sim,
            collisions: Vec::new(),
        })),
        Err(err) => {
            log::error!("Simulation_Create: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Destroy(handle: *mut SimulationHandle) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Reset(handle: *mut SimulationHandle) {
    if let Some(h) = unsafe { handle.as_mut() } {
        h.sim.reset();
        h.collisions.clear();
    }
}

/// Returns the new body's index, or -1 if the body was rejected.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_AddBody(
    handle: *mut SimulationHandle,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    mass: f64,
) -> isize {
    let Some(h) = (unsafe { handle.as_mut() }) else {
        return -1;
    };
    match h.sim.add_body(Body::from_components(x, y, vx, vy, mass)) {
        Ok(index) => index as isize,
        Err(err) => {
            log::error!("Simulation_AddBody: {err}");
            -1
        }
    }
}

/// Advances by `time_units` and returns how many collisions occurred, or -1 on error.
/// The collisions stay readable through `Simulation_GetCollisions` until the next call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Advance(handle: *mut SimulationHandle, time_units: f64) -> isize {
    let Some(h) = (unsafe { handle.as_mut() }) else {
        return -1;
    };
    h.collisions.clear();
    match h.sim.advance(time_units) {
        Ok(records) => {
            h.collisions.extend(records.iter().map(CollisionInfo::from));
            h.collisions.len() as isize
        }
        Err(err) => {
            log::error!("Simulation_Advance: {err}");
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetCollisions(handle: *const SimulationHandle) -> *const CollisionInfo {
    unsafe { handle.as_ref() }.map_or(std::ptr::null(), |h| h.collisions.as_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetBodyCount(handle: *const SimulationHandle) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |h| h.sim.bodies().len())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetBodies(handle: *const SimulationHandle) -> *const Body {
    unsafe { handle.as_ref() }.map_or(std::ptr::null(), |h| h.sim.bodies().as_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Shutdown(handle: *mut SimulationHandle) {
    if let Some(h) = unsafe { handle.as_mut() } {
        h.sim.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_arguments_yield_null() {
        unsafe {
            assert!(Simulation_Create(0.01, 7, 2, 1).is_null());
            assert!(Simulation_Create(0.01, 0, 3, 1).is_null());
            assert!(Simulation_Create(-0.01, 0, 2, 1).is_null());
            assert!(Simulation_Create(0.01, 0, 300, 1).is_null());
        }
    }

    #[test]
    fn round_trip_through_handle() {
        unsafe {
            let handle = Simulation_Create(0.01, 0, 2, 1);
            assert!(!handle.is_null());
            assert_eq!(Simulation_AddBody(handle, 0.5, 0.5, 0.0, 0.0, 1e-6), 0);
            assert_eq!(Simulation_AddBody(handle, 0.51, 0.5, 0.0, 0.0, 0.0), 1);
            assert_eq!(Simulation_AddBody(handle, 0.0, 0.0, 0.0, 0.0, -1.0), -1);
            assert_eq!(Simulation_GetBodyCount(handle), 2);

            assert_eq!(Simulation_Advance(handle, 0.01), 1);
            let info = *Simulation_GetCollisions(handle);
            assert_eq!(info.body_index, 0);
            assert_eq!(info.target_index, 0);
            assert_eq!(info.collision_time, 0.0);

            let bodies = std::slice::from_raw_parts(Simulation_GetBodies(handle), 2);
            assert!(!bodies[1].alive);

            assert_eq!(Simulation_Advance(handle, 0.015), -1);
            Simulation_Shutdown(handle);
            assert_eq!(Simulation_Advance(handle, 0.01), -1);
            Simulation_Reset(handle);
            assert_eq!(Simulation_GetBodyCount(handle), 0);
            Simulation_Destroy(handle);
        }
    }

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            let null = std::ptr::null_mut();
            assert_eq!(Simulation_AddBody(null, 0.0, 0.0, 0.0, 0.0, 0.0), -1);
            assert_eq!(Simulation_Advance(null, 1.0), -1);
            assert_eq!(Simulation_GetBodyCount(null), 0);
            assert!(Simulation_GetBodies(null).is_null());
            Simulation_Reset(null);
            Simulation_Destroy(null);
        }
    }
}
