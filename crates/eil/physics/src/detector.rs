use ndarray::Array2;

use crate::error::DetectorResult;
use crate::types::RegimeState;

/// Physics-side regime classifier over a raw 2D energy map.
///
/// Implementations may keep state between calls (for example the previous
/// entropy of a domain); the caller serialises access.
pub trait RegimeDetector {
    /// Classify the energy map for the given domain.
    fn detect(&mut self, energy_map: &Array2<f64>, domain: &str) -> DetectorResult<RegimeState>;

    /// Name of this detector (for provenance in logs and stats).
    fn name(&self) -> &str;
}

impl<D: RegimeDetector + ?Sized> RegimeDetector for Box<D> {
    fn detect(&mut self, energy_map: &Array2<f64>, domain: &str) -> DetectorResult<RegimeState> {
        (**self).detect(energy_map, domain)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
