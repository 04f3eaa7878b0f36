/**
 * Thrust Allocator
 *
 * Maps 3-DoF commands (surge, sway, heave) through the 8x3 thrust
 * allocation matrix into one PWM target per thruster.
 */

use crate::error::{ControlError, Result};

pub const THRUSTER_COUNT: usize = 8;
pub const DOF_COUNT: usize = 3;

pub const PWM_NEUTRAL: i32 = 1500;
pub const PWM_MIN: i32 = 1100;
pub const PWM_MAX: i32 = 1900;
/// PWM offset produced by a full-scale (+/-1.0) thrust fraction
pub const PWM_SPAN: f32 = 400.0;

/// Commanded force for the three translational degrees of freedom, each in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DofInputs {
    pub surge: f32,
    pub sway: f32,
    pub heave: f32,
}

impl DofInputs {
    pub const NEUTRAL: DofInputs = DofInputs { surge: 0.0, sway: 0.0, heave: 0.0 };

    pub const fn new(surge: f32, sway: f32, heave: f32) -> Self {
        Self { surge, sway, heave }
    }

    pub fn as_array(&self) -> [f32; DOF_COUNT] {
        [self.surge, self.sway, self.heave]
    }

    /// True when every axis magnitude is below `threshold`
    pub fn is_near_zero(&self, threshold: f32) -> bool {
        self.as_array().iter().all(|v| v.abs() < threshold)
    }
}

/// Eight PWM pulse widths in microseconds, always inside [PWM_MIN, PWM_MAX]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PwmVector([i32; THRUSTER_COUNT]);

impl PwmVector {
    pub const NEUTRAL: PwmVector = PwmVector([PWM_NEUTRAL; THRUSTER_COUNT]);

    /// Build a vector, saturating every value into the legal range
    pub fn new(values: [i32; THRUSTER_COUNT]) -> Self {
        let mut out = values;
        for v in out.iter_mut() {
            *v = (*v).clamp(PWM_MIN, PWM_MAX);
        }
        PwmVector(out)
    }

    pub fn as_array(&self) -> [i32; THRUSTER_COUNT] {
        self.0
    }

    pub fn get(&self, index: usize) -> i32 {
        self.0[index]
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    pub(crate) fn set(&mut self, index: usize, value: i32) {
        self.0[index] = value.clamp(PWM_MIN, PWM_MAX);
    }
}

impl Default for PwmVector {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Thrust allocation matrix: one row per thruster, columns [surge, sway, heave].
///
/// Always 8x3 with finite coefficients; malformed input is rejected when the
/// matrix is built, so allocation itself never fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrustAllocationMatrix {
    rows: [[f32; DOF_COUNT]; THRUSTER_COUNT],
}

impl Default for ThrustAllocationMatrix {
    fn default() -> Self {
        Self {
            rows: [
                // Thruster 1 (R1)
                [0.0, 1.0, -1.0],
                // Thruster 2 (L1)
                [0.0, -1.0, -1.0],
                // Thruster 3 (R3)
                [1.0, 0.0, 0.0],
                // Thruster 4 (L3)
                [-1.0, 0.0, 0.0],
                // Thruster 5 (R2)
                [-1.0, 0.0, 0.0],
                // Thruster 6 (L2)
                [1.0, 0.0, 0.0],
                // Thruster 7 (R4)
                [0.0, -1.0, 1.0],
                // Thruster 8 (L4)
                [0.0, 1.0, 1.0],
            ],
        }
    }
}

impl ThrustAllocationMatrix {
    pub fn new(rows: [[f32; DOF_COUNT]; THRUSTER_COUNT]) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            for (j, coeff) in row.iter().enumerate() {
                if !coeff.is_finite() {
                    return Err(ControlError::MalformedMatrix(format!(
                        "non-finite coefficient at row {} column {}",
                        i, j
                    )));
                }
            }
        }
        Ok(Self { rows })
    }

    /// Build from loosely shaped rows (config files, bindings).
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.len() != THRUSTER_COUNT {
            return Err(ControlError::MalformedMatrix(format!(
                "expected {} rows, got {}",
                THRUSTER_COUNT,
                rows.len()
            )));
        }
        let mut out = [[0.0f32; DOF_COUNT]; THRUSTER_COUNT];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != DOF_COUNT {
                return Err(ControlError::MalformedMatrix(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    DOF_COUNT
                )));
            }
            out[i].copy_from_slice(row);
        }
        Self::new(out)
    }

    /// Build from a flat row-major slice of 24 coefficients
    pub fn from_flat(values: &[f32]) -> Result<Self> {
        if values.len() != THRUSTER_COUNT * DOF_COUNT {
            return Err(ControlError::MalformedMatrix(format!(
                "expected {} coefficients, got {}",
                THRUSTER_COUNT * DOF_COUNT,
                values.len()
            )));
        }
        let rows: Vec<Vec<f32>> = values.chunks(DOF_COUNT).map(|c| c.to_vec()).collect();
        Self::from_rows(&rows)
    }

    pub fn rows(&self) -> [[f32; DOF_COUNT]; THRUSTER_COUNT] {
        self.rows
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.rows.iter().map(|r| r.to_vec()).collect()
    }

    /// Per-thruster thrust fractions, each clamped to [-1, 1]
    pub fn mix(&self, inputs: &DofInputs) -> [f32; THRUSTER_COUNT] {
        let dof = inputs.as_array();
        let mut output = [0.0f32; THRUSTER_COUNT];

        for (i, row) in self.rows.iter().enumerate() {
            let mut sum = 0.0;
            for (j, &coeff) in row.iter().enumerate() {
                sum += coeff * dof[j];
            }
            // NaN inputs collapse to neutral rather than poisoning the clamp
            output[i] = if sum.is_nan() { 0.0 } else { sum.clamp(-1.0, 1.0) };
        }

        output
    }

    pub fn allocate(&self, inputs: &DofInputs) -> PwmVector {
        let thrusts = self.mix(inputs);
        let mut pwm = [PWM_NEUTRAL; THRUSTER_COUNT];
        for (out, thrust) in pwm.iter_mut().zip(thrusts.iter()) {
            *out = thrust_to_pwm(*thrust);
        }
        PwmVector::new(pwm)
    }
}

/// Convert a thrust fraction (-1 to 1) to PWM (1100 to 1900)
pub fn thrust_to_pwm(thrust: f32) -> i32 {
    PWM_NEUTRAL + (thrust.clamp(-1.0, 1.0) * PWM_SPAN).round() as i32
}

/// Free-function form of [`ThrustAllocationMatrix::allocate`]
pub fn allocate(inputs: &DofInputs, matrix: &ThrustAllocationMatrix) -> PwmVector {
    matrix.allocate(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_row(row: [f32; 3]) -> ThrustAllocationMatrix {
        ThrustAllocationMatrix::new([row; THRUSTER_COUNT]).unwrap()
    }

    #[test]
    fn test_neutral_inputs_give_neutral_pwm() {
        let tam = ThrustAllocationMatrix::default();
        assert!(allocate(&DofInputs::NEUTRAL, &tam).is_neutral());
    }

    #[test]
    fn test_full_surge_positive_row() {
        let tam = single_row([1.0, 0.0, 0.0]);
        let pwm = allocate(&DofInputs::new(1.0, 0.0, 0.0), &tam);
        assert!(pwm.as_array().iter().all(|&v| v == 1900));
    }

    #[test]
    fn test_full_surge_negative_row() {
        let tam = single_row([-1.0, 0.0, 0.0]);
        let pwm = allocate(&DofInputs::new(1.0, 0.0, 0.0), &tam);
        assert!(pwm.as_array().iter().all(|&v| v == 1100));
    }

    #[test]
    fn test_default_tam_surge() {
        let tam = ThrustAllocationMatrix::default();
        let pwm = allocate(&DofInputs::new(0.5, 0.0, 0.0), &tam);
        assert_eq!(pwm.as_array(), [1500, 1500, 1700, 1300, 1300, 1700, 1500, 1500]);
    }

    #[test]
    fn test_sum_is_clamped_before_scaling() {
        let tam = single_row([1.0, 1.0, 1.0]);
        let pwm = allocate(&DofInputs::new(1.0, 1.0, 1.0), &tam);
        assert_eq!(pwm.get(0), PWM_MAX);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(thrust_to_pwm(0.00126), 1501);
        assert_eq!(thrust_to_pwm(-0.00126), 1499);
        assert_eq!(thrust_to_pwm(0.001), 1500);
    }

    #[test]
    fn test_from_rows_rejects_wrong_shape() {
        let short = vec![vec![0.0, 0.0, 0.0]; 7];
        assert!(ThrustAllocationMatrix::from_rows(&short).is_err());

        let mut narrow = vec![vec![0.0, 0.0, 0.0]; 8];
        narrow[3] = vec![1.0, 0.0];
        assert!(ThrustAllocationMatrix::from_rows(&narrow).is_err());
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut rows = ThrustAllocationMatrix::default().rows();
        rows[2][1] = f32::NAN;
        assert!(ThrustAllocationMatrix::new(rows).is_err());
        rows[2][1] = f32::INFINITY;
        assert!(ThrustAllocationMatrix::new(rows).is_err());
    }

    #[test]
    fn test_from_flat_matches_rows() {
        let tam = ThrustAllocationMatrix::default();
        let flat: Vec<f32> = tam.rows().iter().flat_map(|r| r.iter().copied()).collect();
        assert_eq!(ThrustAllocationMatrix::from_flat(&flat).unwrap(), tam);
        assert!(ThrustAllocationMatrix::from_flat(&flat[..23]).is_err());
    }

    #[test]
    fn test_pwm_vector_saturates() {
        let v = PwmVector::new([0, 5000, 1500, 1100, 1900, -3, 1899, 1101]);
        assert_eq!(v.as_array(), [1100, 1900, 1500, 1100, 1900, 1100, 1899, 1101]);
    }

    proptest! {
        #[test]
        fn prop_output_always_in_range(
            surge in -50.0f32..50.0,
            sway in -50.0f32..50.0,
            heave in -50.0f32..50.0,
            coeffs in proptest::collection::vec(-10.0f32..10.0, 24),
        ) {
            let tam = ThrustAllocationMatrix::from_flat(&coeffs).unwrap();
            let pwm = allocate(&DofInputs::new(surge, sway, heave), &tam);
            for v in pwm.as_array() {
                prop_assert!((PWM_MIN..=PWM_MAX).contains(&v));
            }
        }
    }
}
