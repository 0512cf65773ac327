use nalgebra::{DMatrix, DVector};

/// A simplicial facet of the global lower convex hull.
///
/// The basis matrix of the facet (columns = vertices in reduced
/// mole-fraction coordinates with a trailing row of ones) is stored in
/// inverse form: multiplying it with a target composition point yields
/// the point's barycentric coordinates directly.
#[derive(Clone, Debug)]
pub struct SimplicialFacet {
    /// Hull-map ids of the facet vertices.
    pub vertices: Vec<usize>,
    /// Hyperplane normal over the full global coordinates (mole
    /// fractions then energy); the energy component is ≤ 0 for a facet
    /// of the lower hull.
    pub normal: Vec<f64>,
    pub area: f64,
    /// Inverted barycentric basis; `None` for the degenerate
    /// single-vertex facet, which encloses every target.
    pub basis_inverse: Option<DMatrix<f64>>,
}

impl SimplicialFacet {
    /// Barycentric coordinates of a target point (independent mole
    /// fractions with a trailing 1), or `None` for a single-vertex facet.
    pub fn barycentric(&self, target: &DVector<f64>) -> Option<DVector<f64>> {
        self.basis_inverse.as_ref().map(|inverse| inverse * target)
    }

    /// The facet encloses a target iff every barycentric coordinate is
    /// non-negative; a single-vertex facet encloses trivially.
    pub fn encloses(&self, target: &DVector<f64>) -> bool {
        match self.barycentric(target) {
            None => true,
            Some(weights) => weights.iter().all(|&w| w >= -1e-9),
        }
    }
}
