//! Modal machine state carried through one program export

/// Axis comparison tolerance for duplicate suppression
pub const AXIS_EPSILON: f64 = 1e-6;

/// Last known machine position and modal words.
///
/// Created once per export and threaded by `&mut` through every emitter.
/// An absent axis is unknown, not zero: the first move naming it is always emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineState {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Feed number last written to the program
    pub feed_modal: Option<i64>,
    pub active_tool: Option<u32>,
    /// Height moves only mean something once a tool has been called
    pub tool_initialized: bool,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether moving to the given axes would change the known position
    pub fn axis_changed(&self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool {
        differs(x, self.x) || differs(y, self.y) || differs(z, self.z)
    }

    /// Record the axes that were programmed; absent axes keep their value
    pub fn update_position(&mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) {
        if x.is_some() {
            self.x = x;
        }
        if y.is_some() {
            self.y = y;
        }
        if z.is_some() {
            self.z = z;
        }
    }
}

fn differs(target: Option<f64>, last: Option<f64>) -> bool {
    match (target, last) {
        (Some(t), Some(l)) => (t - l).abs() > AXIS_EPSILON,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
