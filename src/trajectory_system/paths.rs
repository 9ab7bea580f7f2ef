use std::sync::{Arc, Mutex};

use crate::utils::vector2d::Vector2D;

use super::prediction::PredictedPath;

/// Flown and predicted trajectories, shared between the simulation loop,
/// the forecast workers and whoever draws them.
#[derive(Debug, Default)]
pub struct FlightPaths {
    flown: Mutex<Vec<Vector2D>>,
    predicted: Arc<PredictedPath>,
}

impl FlightPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, position: Vector2D) {
        if let Ok(mut flown) = self.flown.lock() {
            flown.push(position);
        }
    }

    /// Copy of the flown path so far.
    pub fn flown(&self) -> Vec<Vector2D> {
        self.flown
            .lock()
            .map(|flown| flown.clone())
            .unwrap_or_default()
    }

    pub fn flown_len(&self) -> usize {
        self.flown.lock().map(|flown| flown.len()).unwrap_or(0)
    }

    pub fn predicted(&self) -> Vec<Vector2D> {
        self.predicted.points()
    }

    pub fn predicted_path(&self) -> &Arc<PredictedPath> {
        &self.predicted
    }

    /// Forgets both paths. Called when a new run starts.
    pub fn reset(&self) {
        if let Ok(mut flown) = self.flown.lock() {
            flown.clear();
        }
        self.predicted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reset() {
        let paths = FlightPaths::new();
        paths.record(Vector2D::new(0.0, 1.0));
        paths.record(Vector2D::new(0.0, 2.0));

        let version = paths.predicted_path().next_version();
        paths
            .predicted_path()
            .publish(version, vec![Vector2D::new(1.0, 1.0)]);

        assert_eq!(paths.flown_len(), 2);
        assert_eq!(paths.flown()[1], Vector2D::new(0.0, 2.0));
        assert_eq!(paths.predicted().len(), 1);

        paths.reset();
        assert!(paths.flown().is_empty());
        assert!(paths.predicted().is_empty());
        assert!(!paths.predicted_path().publish(version, vec![Vector2D::ZERO]));
    }
}
