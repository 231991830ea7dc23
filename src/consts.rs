/// Tolerance for quantity comparisons.
///
/// Quantities are f64 multiples of the lot size; accumulated arithmetic can
/// leave residues around zero. Anything below this is treated as zero.
pub const EPSILON: f64 = 1e-9;
