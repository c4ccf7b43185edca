// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Contains the implementation of the `Trajectory` structure holding coordinates of a sequence of frames.

/// Coordinates of a sequence of structural snapshots (frames).
/// All frames have the same number of atoms. Coordinates are stored frame after frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Number of atoms in each frame.
    n_atoms: usize,
    /// Coordinates of all atoms of all frames.
    xyz: Vec<[f32; 3]>,
}

impl Trajectory {
    /// Create an empty trajectory for structures containing `n_atoms` atoms.
    pub fn empty(n_atoms: usize) -> Self {
        Trajectory {
            n_atoms,
            xyz: Vec::new(),
        }
    }

    /// Create a trajectory from a list of frames.
    /// Returns `None` if the frames do not contain the same number of atoms.
    pub fn from_frames(frames: Vec<Vec<[f32; 3]>>) -> Option<Self> {
        let n_atoms = frames.first().map(|f| f.len()).unwrap_or(0);
        let mut trajectory = Trajectory::empty(n_atoms);

        for frame in frames {
            if frame.len() != n_atoms {
                return None;
            }
            trajectory.xyz.extend(frame);
        }

        Some(trajectory)
    }

    /// Append a frame to the trajectory.
    /// Returns `false` (and does nothing) if the frame has an incorrect number of atoms.
    pub fn push_frame(&mut self, frame: &[[f32; 3]]) -> bool {
        if frame.len() != self.n_atoms {
            return false;
        }

        self.xyz.extend_from_slice(frame);
        true
    }

    /// Number of atoms in each frame.
    #[inline(always)]
    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Number of frames in the trajectory.
    #[inline(always)]
    pub fn n_frames(&self) -> usize {
        if self.n_atoms == 0 {
            0
        } else {
            self.xyz.len() / self.n_atoms
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.n_frames() == 0
    }

    /// Get coordinates of the atoms of the frame with the given index.
    /// Panics if the index is out of range.
    #[inline(always)]
    pub fn frame(&self, index: usize) -> &[[f32; 3]] {
        &self.xyz[index * self.n_atoms..(index + 1) * self.n_atoms]
    }

    /// Iterate over the frames of the trajectory.
    pub fn frames(&self) -> impl Iterator<Item = &[[f32; 3]]> {
        // `chunks_exact` panics for zero chunk size
        self.xyz.chunks_exact(self.n_atoms.max(1))
    }

    /// Create a new trajectory containing only the frames with the specified indices (in the specified order).
    /// Panics if any of the indices is out of range.
    pub fn select(&self, indices: &[usize]) -> Trajectory {
        let mut xyz = Vec::with_capacity(indices.len() * self.n_atoms);
        for &i in indices {
            xyz.extend_from_slice(self.frame(i));
        }

        Trajectory {
            n_atoms: self.n_atoms,
            xyz,
        }
    }

    /// Create a new trajectory containing every `stride`-th frame of this trajectory.
    pub fn stride(&self, stride: usize) -> Trajectory {
        let indices: Vec<usize> = (0..self.n_frames()).step_by(stride.max(1)).collect();
        self.select(&indices)
    }

    /// Concatenate trajectories into a single trajectory.
    /// Returns `None` if the trajectories do not contain the same number of atoms.
    /// Empty trajectories are ignored.
    pub fn concatenate(trajectories: &[Trajectory]) -> Option<Trajectory> {
        let non_empty: Vec<&Trajectory> = trajectories.iter().filter(|t| !t.is_empty()).collect();
        let n_atoms = non_empty
            .first()
            .map(|t| t.n_atoms)
            .unwrap_or_else(|| trajectories.first().map(|t| t.n_atoms).unwrap_or(0));

        if non_empty.iter().any(|t| t.n_atoms != n_atoms) {
            return None;
        }

        let mut xyz = Vec::with_capacity(non_empty.iter().map(|t| t.xyz.len()).sum());
        for t in non_empty {
            xyz.extend_from_slice(&t.xyz);
        }

        Some(Trajectory { n_atoms, xyz })
    }
}
