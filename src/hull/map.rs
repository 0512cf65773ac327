use indexmap::IndexMap;
use std::ops::Index;

/// One point on a phase's energy landscape, as stored in the hull map.
#[derive(Clone, Debug)]
pub struct HullEntry {
    /// Dense id, assigned on insertion and stable for the map's lifetime.
    pub id: usize,
    pub phase_name: String,
    /// Site-fraction coordinates internal to the phase (without the
    /// phase-amount variable).
    pub internal_coordinates: Vec<f64>,
    /// Mole-fraction coordinates, ordered by element.
    pub global_coordinates: IndexMap<String, f64>,
    pub energy: f64,
    pub on_global_hull: bool,
}

/// Append-only store of candidate hull points. Ids are never re-used and
/// entries are never deleted.
#[derive(Default)]
pub struct HullMap {
    entries: Vec<HullEntry>,
}

impl HullMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point and return its id (= the map's previous size).
    pub fn insert_point(
        &mut self,
        phase_name: &str,
        energy: f64,
        internal_coordinates: Vec<f64>,
        global_coordinates: IndexMap<String, f64>,
    ) -> usize {
        let id = self.entries.len();
        self.entries.push(HullEntry {
            id,
            phase_name: phase_name.to_string(),
            internal_coordinates,
            global_coordinates,
            energy,
            on_global_hull: false,
        });
        id
    }

    pub fn set_global_hull_status(&mut self, id: usize, on_global_hull: bool) {
        self.entries[id].on_global_hull = on_global_hull;
    }

    pub fn get_all_points(&self) -> &[HullEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<usize> for HullMap {
    type Output = HullEntry;

    fn index(&self, id: usize) -> &HullEntry {
        &self.entries[id]
    }
}
